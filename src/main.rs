use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mise_config::RecipeDef;
use mise_engine::EngineConfig;
use mise_recipe::Recipe;
use mise_store::{ExecutionStore, FsRecipeStore, RecipeStore, SqliteStore};

/// Mise - a recipe execution engine for multi-step generation pipelines
#[derive(Parser)]
#[command(name = "mise")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.mise)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Engine configuration file (JSON)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// SQLite database holding execution records (default: <data-dir>/mise.db)
  #[arg(long, global = true)]
  database: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Check a recipe file for structural errors
  Validate {
    /// Path to the recipe file (JSON)
    recipe_file: PathBuf,
  },

  /// Print the order a recipe's nodes would run in
  Plan {
    /// Path to the recipe file (JSON)
    recipe_file: PathBuf,
  },

  /// Manage stored recipes
  Recipes {
    #[command(subcommand)]
    action: RecipeAction,
  },

  /// Print an execution record
  Status {
    /// The execution ID
    execution_id: String,
  },

  /// List a recipe's executions, newest first
  Executions {
    /// The recipe ID
    recipe_id: String,
  },

  /// Print the effective engine configuration
  Config,
}

#[derive(Subcommand)]
enum RecipeAction {
  /// Validate a recipe file and store it under <data-dir>/recipes
  Import {
    /// Path to the recipe file (JSON)
    recipe_file: PathBuf,
  },

  /// List stored recipe IDs
  List,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".mise"),
  };
  let database = cli
    .database
    .unwrap_or_else(|| data_dir.join("mise.db"));

  match cli.command {
    Some(Commands::Validate { recipe_file }) => {
      validate(&recipe_file, cli.config.as_deref()).await
    }
    Some(Commands::Plan { recipe_file }) => plan(&recipe_file, cli.config.as_deref()).await,
    Some(Commands::Recipes { action }) => {
      recipes(action, &data_dir, cli.config.as_deref()).await
    }
    Some(Commands::Status { execution_id }) => status(&execution_id, &database).await,
    Some(Commands::Executions { recipe_id }) => executions(&recipe_id, &database).await,
    Some(Commands::Config) => show_config(cli.config.as_deref()).await,
    None => {
      println!("mise - use --help to see available commands");
      Ok(())
    }
  }
}

async fn load_recipe(recipe_file: &Path) -> Result<RecipeDef> {
  let content = tokio::fs::read_to_string(recipe_file)
    .await
    .with_context(|| format!("failed to read recipe file: {}", recipe_file.display()))?;

  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse recipe file: {}", recipe_file.display()))
}

/// Load a recipe and check it against the engine's time budgets.
async fn load_validated(recipe_file: &Path, config_file: Option<&Path>) -> Result<Recipe> {
  let config = load_config(config_file).await?;
  let def = load_recipe(recipe_file).await?;
  let name = def.name.clone();
  let recipe = Recipe::new(def).with_context(|| format!("recipe '{}' is invalid", name))?;
  config
    .check_recipe(&recipe)
    .with_context(|| format!("recipe '{}' does not fit the engine's time budget", name))?;
  Ok(recipe)
}

async fn validate(recipe_file: &Path, config_file: Option<&Path>) -> Result<()> {
  let recipe = load_validated(recipe_file, config_file).await?;
  eprintln!(
    "Recipe '{}' v{} is valid ({} nodes)",
    recipe.id(),
    recipe.def().version,
    recipe.node_count()
  );
  Ok(())
}

async fn plan(recipe_file: &Path, config_file: Option<&Path>) -> Result<()> {
  let recipe = load_validated(recipe_file, config_file).await?;

  let steps: Vec<serde_json::Value> = recipe
    .scheduled()
    .enumerate()
    .map(|(step, node)| {
      serde_json::json!({
        "step": step + 1,
        "node_id": node.id,
        "kind": node.kind(),
        "output_key": node.output_key,
        "dependencies": node.dependencies,
      })
    })
    .collect();

  println!("{}", serde_json::to_string_pretty(&steps)?);
  Ok(())
}

async fn recipes(action: RecipeAction, data_dir: &Path, config_file: Option<&Path>) -> Result<()> {
  let store = FsRecipeStore::new(data_dir.join("recipes"));

  match action {
    RecipeAction::Import { recipe_file } => {
      let recipe = load_validated(&recipe_file, config_file).await?;
      store
        .put_recipe(recipe.def())
        .await
        .context("failed to store recipe")?;
      info!(recipe_id = %recipe.id(), "recipe_imported");
      eprintln!("Stored recipe '{}' in {}", recipe.id(), store.root().display());
    }
    RecipeAction::List => {
      let ids = store.list_recipes().await.context("failed to list recipes")?;
      println!("{}", serde_json::to_string_pretty(&ids)?);
    }
  }

  Ok(())
}

async fn open_store(database: &Path) -> Result<SqliteStore> {
  if !database.exists() {
    bail!("no execution database at {}", database.display());
  }
  SqliteStore::open(database)
    .await
    .with_context(|| format!("failed to open database: {}", database.display()))
}

async fn status(execution_id: &str, database: &Path) -> Result<()> {
  let store = open_store(database).await?;
  let record = store
    .get_execution(execution_id)
    .await
    .with_context(|| format!("failed to load execution {}", execution_id))?;

  println!("{}", serde_json::to_string_pretty(&record)?);
  Ok(())
}

async fn executions(recipe_id: &str, database: &Path) -> Result<()> {
  let store = open_store(database).await?;
  let records = store
    .list_executions(recipe_id)
    .await
    .with_context(|| format!("failed to list executions for {}", recipe_id))?;

  let summaries: Vec<serde_json::Value> = records
    .iter()
    .map(|r| {
      serde_json::json!({
        "execution_id": r.execution_id,
        "recipe_version": r.recipe_version,
        "status": r.status,
        "started_at": r.started_at,
        "completed_at": r.completed_at,
        "failed_node_id": r.failed_node_id,
      })
    })
    .collect();

  println!("{}", serde_json::to_string_pretty(&summaries)?);
  Ok(())
}

async fn load_config(config_file: Option<&Path>) -> Result<EngineConfig> {
  let config = match config_file {
    Some(path) => {
      let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
      serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?
    }
    None => EngineConfig::default(),
  };
  config.validate().context("invalid engine configuration")?;
  Ok(config)
}

async fn show_config(config_file: Option<&Path>) -> Result<()> {
  let config = load_config(config_file).await?;
  println!("{}", serde_json::to_string_pretty(&config)?);
  Ok(())
}
