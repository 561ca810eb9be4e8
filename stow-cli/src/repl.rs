//! Line-oriented REPL over the todo store and the pets API.
//!
//! ## Commands
//!
//! - `add <text>`: add a todo
//! - `remove <id>`: remove a todo
//! - `list`: show todos
//! - `breeds [animal]`: list breeds for an animal
//! - `search [animal=..] [location=..] [breed=..]`: search pets
//! - `details <id>`: show one pet
//! - `adopt <id>`: adopt a pet
//! - `adopted`: show the adopted pet
//! - `help`, `quit`

use std::sync::Arc;
use stow_client::{
    CacheConfig, Fetcher, Item, ItemId, QueryCache, QueryObserver, QueryResult, SharedSlot,
    SlotHandle, Store, StoreChange, StowError,
};
use thiserror::Error;

use crate::api::{breeds_key, details_key, search_key, BreedList, Pet, PetSearch};

/// Pet kinds offered by the search form.
pub const ANIMALS: [&str; 5] = ["bird", "cat", "dog", "rabbit", "reptile"];

/// A parsed REPL line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Remove(ItemId),
    List,
    Breeds(String),
    Search {
        animal: String,
        location: String,
        breed: String,
    },
    Details(i64),
    Adopt(i64),
    Adopted,
    Help,
    Quit,
}

/// Errors from parsing a REPL line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Invalid(#[from] StowError),
    #[error("unknown animal '{0}', expected one of: bird, cat, dog, rabbit, reptile")]
    UnknownAnimal(String),
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Option<Result<Command, ParseError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };
    Some(parse_parts(name, rest))
}

fn parse_parts(name: &str, rest: &str) -> Result<Command, ParseError> {
    match name {
        "add" => {
            if rest.is_empty() {
                return Err(StowError::EmptyText.into());
            }
            Ok(Command::Add(rest.to_string()))
        }
        "remove" | "rm" => Ok(Command::Remove(rest.parse()?)),
        "list" | "ls" => Ok(Command::List),
        "breeds" => Ok(Command::Breeds(animal(rest)?)),
        "search" => parse_search(rest),
        "details" => Ok(Command::Details(pet_id(rest, "details <id>")?)),
        "adopt" => Ok(Command::Adopt(pet_id(rest, "adopt <id>")?)),
        "adopted" => Ok(Command::Adopted),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(ParseError::Unknown(other.to_string())),
    }
}

fn animal(value: &str) -> Result<String, ParseError> {
    if value.is_empty() || ANIMALS.contains(&value) {
        Ok(value.to_string())
    } else {
        Err(ParseError::UnknownAnimal(value.to_string()))
    }
}

fn pet_id(value: &str, usage: &'static str) -> Result<i64, ParseError> {
    value.parse().map_err(|_| ParseError::Usage(usage))
}

fn parse_search(rest: &str) -> Result<Command, ParseError> {
    const USAGE: &str = "search [animal=..] [location=..] [breed=..]";
    let (mut animal_value, mut location, mut breed) = (String::new(), String::new(), String::new());

    for arg in rest.split_whitespace() {
        let (field, value) = arg.split_once('=').ok_or(ParseError::Usage(USAGE))?;
        match field {
            "animal" => animal_value = animal(value)?,
            "location" => location = value.to_string(),
            "breed" => breed = value.to_string(),
            _ => return Err(ParseError::Usage(USAGE)),
        }
    }

    Ok(Command::Search {
        animal: animal_value,
        location,
        breed,
    })
}

/// Fetchers used by the REPL.
pub struct Fetchers {
    pub breeds: Arc<dyn Fetcher<BreedList>>,
    pub search: Arc<dyn Fetcher<PetSearch>>,
    pub details: Arc<dyn Fetcher<PetSearch>>,
}

/// What the caller should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// REPL state: the todo store, the query caches and the adopted pet.
pub struct App {
    store: Store,
    breeds: QueryObserver<BreedList, Arc<dyn Fetcher<BreedList>>>,
    search: QueryObserver<PetSearch, Arc<dyn Fetcher<PetSearch>>>,
    details: QueryCache<PetSearch>,
    details_fetcher: Arc<dyn Fetcher<PetSearch>>,
    adopted: SharedSlot<Pet>,
    last_id: Option<ItemId>,
}

impl App {
    /// Create the app with fresh caches.
    pub fn new(cache_config: CacheConfig, fetchers: Fetchers) -> Self {
        Self {
            store: Store::new(),
            breeds: QueryObserver::new(QueryCache::new(cache_config.clone()), fetchers.breeds),
            search: QueryObserver::new(QueryCache::new(cache_config.clone()), fetchers.search),
            details: QueryCache::new(cache_config),
            details_fetcher: fetchers.details,
            adopted: SharedSlot::new("adopted-pet"),
            last_id: None,
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Handle to the adopted pet slot.
    pub fn adopted(&self) -> SlotHandle<Pet> {
        self.adopted.handle()
    }

    /// Run one command, returning the lines to print.
    pub async fn execute(&mut self, command: Command) -> anyhow::Result<(Flow, Vec<String>)> {
        let lines = match command {
            Command::Add(text) => self.add(&text)?,
            Command::Remove(id) => self.remove(id),
            Command::List => self.list(),
            Command::Breeds(animal) => self.show_breeds(&animal).await,
            Command::Search {
                animal,
                location,
                breed,
            } => self.show_search(&animal, &location, &breed).await,
            Command::Details(id) => self.show_details(id).await,
            Command::Adopt(id) => self.adopt(id).await?,
            Command::Adopted => self.show_adopted()?,
            Command::Help => help(),
            Command::Quit => return Ok((Flow::Quit, vec![])),
        };
        Ok((Flow::Continue, lines))
    }

    /// Clock-derived id, bumped past the previous one when two adds share a millisecond.
    fn next_id(&mut self) -> ItemId {
        let clock = ItemId::from_clock();
        let id = match self.last_id {
            Some(last) if clock <= last => ItemId::new(last.value().saturating_add(1)),
            _ => clock,
        };
        self.last_id = Some(id);
        id
    }

    fn add(&mut self, text: &str) -> anyhow::Result<Vec<String>> {
        let item = Item::validated(self.next_id(), text)?;
        let changes = self.store.add(item);
        Ok(changes.iter().map(describe_change).collect())
    }

    fn remove(&self, id: ItemId) -> Vec<String> {
        let changes = self.store.remove(id);
        if changes.is_empty() {
            return vec![format!("no todo with id {}", id)];
        }
        changes.iter().map(describe_change).collect()
    }

    fn list(&self) -> Vec<String> {
        let items = self.store.items();
        if items.is_empty() {
            return vec!["no todos".to_string()];
        }
        items
            .iter()
            .map(|item| format!("[{}] {}", item.id, item.text))
            .collect()
    }

    async fn show_breeds(&mut self, animal: &str) -> Vec<String> {
        self.breeds.set_key(breeds_key(animal)).await;
        let result = self.breeds.wait().await;
        match result {
            Some(result) if result.is_error() => vec![describe_error(&result)],
            Some(result) => {
                let breeds = result.data_or_default().breeds;
                if breeds.is_empty() {
                    vec!["no breeds".to_string()]
                } else {
                    breeds
                }
            }
            None => vec!["no breeds".to_string()],
        }
    }

    async fn show_search(&mut self, animal: &str, location: &str, breed: &str) -> Vec<String> {
        self.search
            .set_key(search_key(animal, location, breed))
            .await;
        let result = self.search.wait().await;
        match result {
            Some(result) if result.is_error() => vec![describe_error(&result)],
            Some(result) => {
                let mut lines = Vec::new();
                if let Some(pet) = self.adopted.get() {
                    lines.push(format!("adopted: {}", pet.name));
                }
                let pets = result.data_or_default().pets;
                if pets.is_empty() {
                    lines.push("no pets found".to_string());
                }
                lines.extend(pets.iter().map(|pet| format!("#{} {}", pet.id, pet.summary())));
                lines
            }
            None => vec!["no pets found".to_string()],
        }
    }

    async fn load_pet(&self, id: i64) -> Result<Option<Pet>, String> {
        let result = self
            .details
            .fetch(&details_key(id), &self.details_fetcher)
            .await;
        if result.is_error() {
            return Err(describe_error(&result));
        }
        Ok(result.data_or_default().pets.into_iter().next())
    }

    async fn show_details(&self, id: i64) -> Vec<String> {
        match self.load_pet(id).await {
            Ok(Some(pet)) => vec![
                pet.name.clone(),
                format!("{} - {} - {} - {}", pet.name, pet.breed, pet.city, pet.state),
                pet.description,
            ],
            Ok(None) => vec![format!("no pet with id {}", id)],
            Err(message) => vec![message],
        }
    }

    async fn adopt(&self, id: i64) -> anyhow::Result<Vec<String>> {
        match self.load_pet(id).await {
            Ok(Some(pet)) => {
                let line = format!("adopted {}", pet.name);
                tracing::info!(pet = %pet.name, id, "pet adopted");
                self.adopted().set(pet)?;
                Ok(vec![line])
            }
            Ok(None) => Ok(vec![format!("no pet with id {}", id)]),
            Err(message) => Ok(vec![message]),
        }
    }

    fn show_adopted(&self) -> anyhow::Result<Vec<String>> {
        Ok(match self.adopted().get()? {
            Some(pet) => vec![pet.summary()],
            None => vec!["no pet adopted yet".to_string()],
        })
    }
}

fn describe_change(change: &StoreChange) -> String {
    match change {
        StoreChange::Appended { id } => format!("added {}", id),
        StoreChange::Removed { id } => format!("removed {}", id),
        StoreChange::DuplicateRejected { id } => format!("todo {} already exists", id),
    }
}

fn describe_error<T>(result: &QueryResult<T>) -> String {
    match &result.error {
        Some(error) => format!("error: {}", error),
        None => "error".to_string(),
    }
}

fn help() -> Vec<String> {
    [
        "add <text>          add a todo",
        "remove <id>         remove a todo",
        "list                show todos",
        "breeds [animal]     list breeds",
        "search [animal=..] [location=..] [breed=..]",
        "details <id>        show a pet",
        "adopt <id>          adopt a pet",
        "adopted             show the adopted pet",
        "quit                exit",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stow_client::{FetchError, MockFetcher};

    struct Mocks {
        breeds: MockFetcher<BreedList>,
        search: MockFetcher<PetSearch>,
        details: MockFetcher<PetSearch>,
    }

    fn app() -> (App, Mocks) {
        let mocks = Mocks {
            breeds: MockFetcher::new(),
            search: MockFetcher::new(),
            details: MockFetcher::new(),
        };
        let app = App::new(
            CacheConfig::default(),
            Fetchers {
                breeds: Arc::new(mocks.breeds.clone()),
                search: Arc::new(mocks.search.clone()),
                details: Arc::new(mocks.details.clone()),
            },
        );
        (app, mocks)
    }

    fn luna() -> Pet {
        Pet {
            id: 1,
            name: "Luna".into(),
            animal: "dog".into(),
            breed: "Havanese".into(),
            city: "Seattle".into(),
            state: "WA".into(),
            description: "Good dog".into(),
            images: vec![],
        }
    }

    fn found(pets: Vec<Pet>) -> PetSearch {
        PetSearch {
            number_of_results: pets.len() as u64,
            pets,
            ..Default::default()
        }
    }

    async fn run(app: &mut App, line: &str) -> Vec<String> {
        let command = parse_command(line).unwrap().unwrap();
        app.execute(command).await.unwrap().1
    }

    // ===========================================
    // Parsing Tests
    // ===========================================

    #[test]
    fn parses_add_with_spaces() {
        assert_eq!(
            parse_command("add  buy milk "),
            Some(Ok(Command::Add("buy milk".into())))
        );
    }

    #[test]
    fn blank_line_is_skipped() {
        assert_eq!(parse_command("   "), None);
    }

    #[test]
    fn add_without_text_is_rejected() {
        assert_eq!(
            parse_command("add   "),
            Some(Err(ParseError::Invalid(StowError::EmptyText)))
        );
    }

    #[test]
    fn remove_needs_numeric_id() {
        assert_eq!(
            parse_command("remove 42"),
            Some(Ok(Command::Remove(ItemId::new(42))))
        );
        assert!(matches!(
            parse_command("remove abc"),
            Some(Err(ParseError::Invalid(StowError::InvalidItemId(_))))
        ));
    }

    #[test]
    fn parses_search_fields_in_any_order() {
        assert_eq!(
            parse_command("search location=WA animal=dog"),
            Some(Ok(Command::Search {
                animal: "dog".into(),
                location: "WA".into(),
                breed: String::new(),
            }))
        );
    }

    #[test]
    fn search_rejects_unknown_field() {
        assert!(matches!(
            parse_command("search color=red"),
            Some(Err(ParseError::Usage(_)))
        ));
    }

    #[test]
    fn unknown_animal_is_rejected() {
        assert_eq!(
            parse_command("breeds dragon"),
            Some(Err(ParseError::UnknownAnimal("dragon".into())))
        );
    }

    #[test]
    fn breeds_without_animal_is_allowed() {
        assert_eq!(parse_command("breeds"), Some(Ok(Command::Breeds(String::new()))));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("fly"),
            Some(Err(ParseError::Unknown("fly".into())))
        );
    }

    // ===========================================
    // Todo Tests
    // ===========================================

    #[tokio::test]
    async fn add_and_list_keep_order() {
        let (mut app, _) = app();
        run(&mut app, "add buy milk").await;
        run(&mut app, "add walk dog").await;

        let items = app.store().items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "buy milk");
        assert_eq!(items[1].text, "walk dog");
        assert!(items[0].id < items[1].id);

        let lines = run(&mut app, "list").await;
        assert!(lines[0].ends_with("buy milk"));
        assert!(lines[1].ends_with("walk dog"));
    }

    #[tokio::test]
    async fn remove_by_id() {
        let (mut app, _) = app();
        run(&mut app, "add a").await;
        run(&mut app, "add b").await;
        let first = app.store().items()[0].id;

        let lines = run(&mut app, &format!("remove {}", first)).await;
        assert_eq!(lines, vec![format!("removed {}", first)]);

        let lines = run(&mut app, &format!("remove {}", first)).await;
        assert_eq!(lines, vec![format!("no todo with id {}", first)]);
        assert_eq!(app.store().items().len(), 1);
    }

    #[tokio::test]
    async fn quit_stops() {
        let (mut app, _) = app();
        let (flow, _) = app.execute(Command::Quit).await.unwrap();
        assert_eq!(flow, Flow::Quit);
    }

    // ===========================================
    // Pets Tests
    // ===========================================

    #[tokio::test]
    async fn breeds_are_fetched_once() {
        let (mut app, mocks) = app();
        mocks.breeds.queue_ok(BreedList {
            animal: "dog".into(),
            breeds: vec!["lab".into(), "poodle".into()],
        });

        assert_eq!(run(&mut app, "breeds dog").await, vec!["lab", "poodle"]);
        assert_eq!(run(&mut app, "breeds dog").await, vec!["lab", "poodle"]);
        assert_eq!(mocks.breeds.call_count(), 1);
    }

    #[tokio::test]
    async fn breeds_without_animal_skip_fetch() {
        let (mut app, mocks) = app();
        assert_eq!(run(&mut app, "breeds").await, vec!["no breeds"]);
        assert_eq!(mocks.breeds.call_count(), 0);
    }

    #[tokio::test]
    async fn search_lists_pets() {
        let (mut app, mocks) = app();
        mocks.search.queue_ok(found(vec![luna()]));

        let lines = run(&mut app, "search animal=dog").await;
        assert_eq!(lines, vec!["#1 Luna (dog, Havanese) - Seattle, WA"]);
    }

    #[tokio::test]
    async fn fetch_errors_are_shown() {
        let (mut app, mocks) = app();
        mocks.search.queue_err(FetchError::Status(500));

        let lines = run(&mut app, "search").await;
        assert_eq!(lines, vec!["error: unexpected status: 500"]);
    }

    #[tokio::test]
    async fn adopted_pet_is_shared_with_search() {
        let (mut app, mocks) = app();
        mocks.details.queue_ok(found(vec![luna()]));
        mocks.search.queue_ok(found(vec![]));

        assert_eq!(run(&mut app, "adopted").await, vec!["no pet adopted yet"]);
        assert_eq!(run(&mut app, "adopt 1").await, vec!["adopted Luna"]);
        assert_eq!(app.adopted().get().unwrap(), Some(luna()));

        let lines = run(&mut app, "search").await;
        assert_eq!(lines, vec!["adopted: Luna", "no pets found"]);

        // Details come from the cache populated by adopt.
        let lines = run(&mut app, "details 1").await;
        assert_eq!(lines[0], "Luna");
        assert_eq!(mocks.details.call_count(), 1);
    }

    #[tokio::test]
    async fn unknown_pet_id() {
        let (mut app, mocks) = app();
        mocks.details.queue_ok(found(vec![]));

        assert_eq!(run(&mut app, "adopt 99").await, vec!["no pet with id 99"]);
        assert_eq!(app.adopted().get().unwrap(), None);
    }
}
