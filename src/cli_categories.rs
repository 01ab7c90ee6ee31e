use anyhow::{Context, Result};
use catalog_categories::category::{
    CategoryError, CategoryId, CategoryService, DeleteMode, SqliteCategoryStore, TenantId,
};
use catalog_categories::cli_style::{self, get_styles, TableBuilder};
use catalog_categories::config::{AppConfig, CliConfig, FileConfig, LoggingLevel};
use clap::{CommandFactory, Parser, Subcommand};
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rustyline::{
    completion::Completer, highlight::Highlighter, history::FileHistory, validate::Validator,
    CompletionType, Config, Editor, Helper,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

fn parse_delete_mode(s: &str) -> Result<DeleteMode, String> {
    s.parse::<DeleteMode>().map_err(|e| e.to_string())
}

#[derive(Parser, Debug)]
#[command(styles=get_styles())]
struct CliArgs {
    /// Path to the SQLite category database file, created if missing.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Path to a TOML config file. Its values override the flags.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Tenant whose categories are managed at startup.
    #[clap(long, default_value_t = 1)]
    pub tenant: i64,

    /// Maximum number of category levels, roots included.
    #[clap(long)]
    pub max_depth: Option<u32>,

    /// Delete mode used when `delete` is given no --mode.
    #[clap(long, default_value = "strict", value_parser = parse_delete_mode)]
    pub default_delete_mode: DeleteMode,

    #[clap(long, value_enum, default_value_t = LoggingLevel::Info)]
    pub logging_level: LoggingLevel,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db_path.clone(),
            max_depth: self.max_depth,
            default_delete_mode: self.default_delete_mode,
            logging_level: self.logging_level,
        }
    }
}

#[derive(Parser)]
#[command(styles=get_styles(),name = "")]
struct InnerCli {
    #[command(subcommand)]
    command: InnerCommand,
}

#[derive(Subcommand)]
enum InnerCommand {
    /// Shows the category tree with direct/total item counts.
    Tree {
        /// Print the tree as JSON instead.
        #[clap(long)]
        json: bool,
    },

    /// Lists every category in path order.
    List,

    /// Shows a single category.
    Show { id: i64 },

    /// Creates a category, as a root unless a parent is given.
    Create {
        name: String,
        #[clap(long)]
        parent: Option<i64>,
    },

    /// Renames a category.
    Rename { id: i64, name: String },

    /// Moves a category and its subtree under another parent, or to the
    /// top level when no parent is given.
    Move {
        id: i64,
        #[clap(long)]
        to: Option<i64>,
    },

    /// Deletes a category. Strict mode fails if the category still has
    /// items or subcategories, cascade removes the whole subtree.
    Delete {
        id: i64,
        #[clap(long, value_parser = parse_delete_mode)]
        mode: Option<DeleteMode>,
    },

    /// Files an item under a category.
    Assign { item_id: String, category_id: i64 },

    /// Removes an item from its category.
    Unassign { item_id: String },

    /// Moves all items of a category into another one.
    Reassign { from: i64, to: i64 },

    /// Shows which category an item is filed under.
    Locate { item_id: String },

    /// Shows the chain of categories from the root to the given one.
    Breadcrumbs { id: i64 },

    /// Switches the active tenant.
    Tenant { id: i64 },

    /// Shows the path of the current category db.
    Where,

    /// Close this program.
    Exit,
}

enum CommandExecutionResult {
    Ok,
    Exit,
    Error(String),
}

struct Session {
    service: CategoryService<SqliteCategoryStore>,
    tenant: TenantId,
    default_delete_mode: DeleteMode,
    db_path: String,
}

fn describe(err: CategoryError) -> CommandExecutionResult {
    if err.is_user_error() {
        CommandExecutionResult::Error(err.to_string())
    } else {
        CommandExecutionResult::Error(format!("{} (see logs)", err))
    }
}

fn execute_command(line: String, session: &mut Session) -> CommandExecutionResult {
    if line.trim().is_empty() {
        return CommandExecutionResult::Ok;
    }

    let args =
        shlex::split(&line).unwrap_or_else(|| line.split_whitespace().map(String::from).collect());

    let cli = InnerCli::try_parse_from(std::iter::once(" ").chain(args.iter().map(String::as_str)));

    let command = match cli {
        Ok(cli) => cli.command,
        Err(e) => {
            if e.print().is_err() {
                println!("{}", e);
            }
            return CommandExecutionResult::Ok;
        }
    };

    let service = &session.service;
    let tenant = session.tenant;
    match command {
        InnerCommand::Tree { json } => {
            let forest = match service.get_tree(tenant) {
                Ok(forest) => forest,
                Err(err) => return describe(err),
            };
            if json {
                match serde_json::to_string_pretty(&forest) {
                    Ok(json) => println!("{}", json),
                    Err(err) => return CommandExecutionResult::Error(err.to_string()),
                }
            } else {
                cli_style::print_tree(&forest);
            }
        }
        InnerCommand::List => {
            let categories = match service.list_flat(tenant) {
                Ok(categories) => categories,
                Err(err) => return describe(err),
            };
            if categories.is_empty() {
                cli_style::print_empty("no categories yet");
                return CommandExecutionResult::Ok;
            }
            let mut table = TableBuilder::new(&["id", "path", "level", "parent", "name"]);
            for category in categories {
                table.add_row(vec![
                    category.id.to_string(),
                    category.path,
                    category.level.to_string(),
                    category
                        .parent_id
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    category.name,
                ]);
            }
            table.print();
        }
        InnerCommand::Show { id } => {
            let id = CategoryId(id);
            let category = match service.get_category(tenant, id) {
                Ok(category) => category,
                Err(err) => return describe(err),
            };
            let items = match service.item_count(tenant, id) {
                Ok(items) => items,
                Err(err) => return describe(err),
            };
            let mut table = TableBuilder::new(&["field", "value"]);
            table.add_row(vec!["id".to_string(), category.id.to_string()]);
            table.add_row(vec!["name".to_string(), category.name]);
            table.add_row(vec!["path".to_string(), category.path]);
            table.add_row(vec!["level".to_string(), category.level.to_string()]);
            table.add_row(vec!["items".to_string(), items.to_string()]);
            table.print();
        }
        InnerCommand::Create { name, parent } => {
            match service.create(tenant, parent.map(CategoryId), &name) {
                Ok(created) => cli_style::print_success(&format!(
                    "Created '{}' with id {} at {}",
                    created.name, created.id, created.path
                )),
                Err(err) => return describe(err),
            }
        }
        InnerCommand::Rename { id, name } => match service.rename(tenant, CategoryId(id), &name) {
            Ok(renamed) => cli_style::print_success(&format!("Renamed {} to '{}'", id, renamed.name)),
            Err(err) => return describe(err),
        },
        InnerCommand::Move { id, to } => {
            match service.move_category(tenant, CategoryId(id), to.map(CategoryId)) {
                Ok(moved) => {
                    cli_style::print_success(&format!("Moved {} to {}", moved.id, moved.path))
                }
                Err(err) => return describe(err),
            }
        }
        InnerCommand::Delete { id, mode } => {
            let mode = mode.unwrap_or(session.default_delete_mode);
            match service.delete(tenant, CategoryId(id), mode) {
                Ok(outcome) => {
                    cli_style::print_success(&format!(
                        "Deleted {} categories",
                        outcome.deleted.len()
                    ));
                    if outcome.detached_items > 0 {
                        cli_style::print_warning(&format!(
                            "{} items are no longer filed under any category",
                            outcome.detached_items
                        ));
                    }
                }
                Err(err @ CategoryError::HasItems { .. }) => {
                    return CommandExecutionResult::Error(format!(
                        "{}. Use 'reassign' to move them elsewhere first, or --mode cascade.",
                        err
                    ));
                }
                Err(err) => return describe(err),
            }
        }
        InnerCommand::Assign {
            item_id,
            category_id,
        } => match service.assign_item(tenant, &item_id, CategoryId(category_id)) {
            Ok(()) => cli_style::print_success(&format!(
                "Filed '{}' under {}",
                item_id, category_id
            )),
            Err(err) => return describe(err),
        },
        InnerCommand::Unassign { item_id } => match service.unassign_item(tenant, &item_id) {
            Ok(true) => cli_style::print_success(&format!("Unfiled '{}'", item_id)),
            Ok(false) => cli_style::print_warning(&format!("'{}' was not filed", item_id)),
            Err(err) => return describe(err),
        },
        InnerCommand::Reassign { from, to } => {
            match service.reassign_items(tenant, CategoryId(from), CategoryId(to)) {
                Ok(moved) => cli_style::print_success(&format!(
                    "Moved {} items from {} to {}",
                    moved, from, to
                )),
                Err(err) => return describe(err),
            }
        }
        InnerCommand::Locate { item_id } => match service.category_of_item(tenant, &item_id) {
            Ok(Some(category)) => match service.breadcrumbs(tenant, category.id) {
                Ok(chain) => cli_style::print_breadcrumbs(&chain),
                Err(err) => return describe(err),
            },
            Ok(None) => cli_style::print_empty(&format!("'{}' is not filed", item_id)),
            Err(err) => return describe(err),
        },
        InnerCommand::Breadcrumbs { id } => match service.breadcrumbs(tenant, CategoryId(id)) {
            Ok(chain) => cli_style::print_breadcrumbs(&chain),
            Err(err) => return describe(err),
        },
        InnerCommand::Tenant { id } => {
            session.tenant = TenantId(id);
            cli_style::print_success(&format!("Switched to tenant {}", id));
        }
        InnerCommand::Where => {
            println!("{}", session.db_path);
        }
        InnerCommand::Exit => return CommandExecutionResult::Exit,
    }
    CommandExecutionResult::Ok
}

#[derive(rustyline_derive::Hinter)]
struct MyHelper {
    commands_names: Vec<String>,
}

impl MyHelper {
    pub fn new() -> Self {
        let commands_names: Vec<String> = InnerCli::command()
            .get_subcommands()
            .map(|sc| sc.get_name().to_string())
            .collect();

        MyHelper { commands_names }
    }
}

impl Completer for MyHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if line.contains(' ') {
            return Ok((0, Vec::with_capacity(0)));
        }
        let matches = self
            .commands_names
            .iter()
            .filter(|c| c.starts_with(line))
            .cloned()
            .collect::<Vec<_>>();

        Ok((0, matches))
    }
}

impl Highlighter for MyHelper {
    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        _default: bool,
    ) -> Cow<'b, str> {
        Cow::Owned(cli_style::style_prompt(prompt))
    }
}
impl Validator for MyHelper {}
impl Helper for MyHelper {}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let app_config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)
        .with_context(|| "Invalid configuration")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(app_config.logging_level.level_filter().into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    info!("Opening category database at {:?}...", app_config.db_path);
    let store = Arc::new(SqliteCategoryStore::new(&app_config.db_path)?);
    let mut session = Session {
        service: CategoryService::new(store, app_config.service_settings()),
        tenant: TenantId(cli_args.tenant),
        default_delete_mode: app_config.default_delete_mode,
        db_path: app_config.db_path.display().to_string(),
    };

    cli_style::print_welcome(&session.db_path, session.tenant.0);

    let config = Config::builder()
        .completion_type(CompletionType::List)
        .build();

    let mut rl = Editor::<MyHelper, FileHistory>::with_config(config)?;
    rl.set_helper(Some(MyHelper::new()));

    loop {
        let readline = rl.readline(&cli_style::get_prompt(session.tenant.0));

        match readline {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                match execute_command(line, &mut session) {
                    CommandExecutionResult::Ok => {}
                    CommandExecutionResult::Exit => {
                        break;
                    }
                    CommandExecutionResult::Error(err) => {
                        cli_style::print_error(&err);
                        continue;
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("CTRL-D: exiting.");
                break;
            }
            Err(e) => {
                println!("Error: {:?}", e);
                break;
            }
        }
    }
    cli_style::print_goodbye();
    Ok(())
}
