//! Binary entrypoint for the cultivation CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml`
//! - `new <name> [--slot]` - create a character and save it
//! - `play --script <file> [--slot]` - run a JSON list of actions against a saved session
//! - `status [--slot]` - print the character sheet and recent log
//! - `saves` - list save slots
//! - `content [--out <file>]` - dump the active content tables as JSON
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::sync::Arc;

use cultivation::config::Config;
use cultivation::engine::{
    Action, Clock, ContentTables, Engine, ManualClock, RandomSource, SaveStore, SeededRandom,
};

const LOG_TAIL: usize = 10;

#[derive(Parser)]
#[command(name = "cultivation")]
#[command(about = "A text cultivation RPG progression engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Create a new character in a save slot
    New {
        name: String,
        #[arg(short, long, default_value = "main")]
        slot: String,
        /// Replace an existing save in the slot
        #[arg(long)]
        force: bool,
    },
    /// Run a script of actions (a JSON array) against a saved session
    Play {
        #[arg(long)]
        script: String,
        #[arg(short, long, default_value = "main")]
        slot: String,
    },
    /// Show the character in a save slot
    Status {
        #[arg(short, long, default_value = "main")]
        slot: String,
    },
    /// List save slots
    Saves,
    /// Print the active content tables
    Content {
        #[arg(short, long)]
        out: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            init_logging(None, cli.verbose);
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::New { name, slot, force } => {
            let (config, content) = setup(&cli.config, cli.verbose).await?;
            let store = open_store(&config)?;
            if store.exists(&slot)? && !force {
                return Err(anyhow!("slot '{}' already holds a save (use --force to replace)", slot));
            }
            let clock = Arc::new(ManualClock::new(Utc::now()));
            let engine = Engine::new(content, &name, rng_for(&config), clock, config.engine.settings());
            store.save(&slot, &engine.snapshot())?;
            println!("{} begins their cultivation in slot '{}'.", name, slot);
        }
        Commands::Play { script, slot } => {
            let (config, content) = setup(&cli.config, cli.verbose).await?;
            let raw = tokio::fs::read_to_string(&script)
                .await
                .with_context(|| format!("reading script {}", script))?;
            let actions: Vec<Action> =
                serde_json::from_str(&raw).with_context(|| format!("parsing script {}", script))?;

            let store = open_store(&config)?;
            let clock = ManualClock::new(Utc::now());
            let mut engine = restore(&store, &slot, &config, content, clock.clone())?;
            run_script(&mut engine, &clock, actions)?;
            store.save(&slot, &engine.snapshot())?;
            print_log_tail(&engine);
        }
        Commands::Status { slot } => {
            let (config, content) = setup(&cli.config, cli.verbose).await?;
            let store = open_store(&config)?;
            let clock = ManualClock::new(Utc::now());
            let mut engine = restore(&store, &slot, &config, content, clock)?;
            engine.tick();
            print_status(&engine);
            print_log_tail(&engine);
        }
        Commands::Saves => {
            let (config, _) = setup(&cli.config, cli.verbose).await?;
            let store = open_store(&config)?;
            let saves = store.list()?;
            if saves.is_empty() {
                println!("No saves.");
            }
            for save in saves {
                println!(
                    "{:<12} {:<20} level {:<4} {}",
                    save.slot,
                    save.character_name,
                    save.level,
                    save.saved_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Commands::Content { out } => {
            let (_, content) = setup(&cli.config, cli.verbose).await?;
            let json = content.to_json_pretty()?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, json).await?;
                    info!("content written to {}", path);
                }
                None => println!("{}", json),
            }
        }
    }

    Ok(())
}

async fn setup(path: &str, verbosity: u8) -> Result<(Config, Arc<ContentTables>)> {
    let config = Config::load_or_default(path).await?;
    init_logging(Some(&config), verbosity);
    let content = Arc::new(load_content(&config)?);
    Ok((config, content))
}

fn load_content(config: &Config) -> Result<ContentTables> {
    match &config.content.path {
        Some(path) => {
            let content =
                ContentTables::load_json(path).with_context(|| format!("loading content from {}", path))?;
            info!("loaded content from {}", path);
            Ok(content)
        }
        None => Ok(ContentTables::builtin()),
    }
}

fn open_store(config: &Config) -> Result<SaveStore> {
    Ok(SaveStore::open(config.storage.saves_dir())?)
}

fn rng_for(config: &Config) -> Box<dyn RandomSource> {
    match config.engine.rng_seed {
        Some(seed) => Box::new(SeededRandom::from_seed(seed)),
        None => Box::new(SeededRandom::from_entropy()),
    }
}

fn restore(
    store: &SaveStore,
    slot: &str,
    config: &Config,
    content: Arc<ContentTables>,
    clock: ManualClock,
) -> Result<Engine> {
    let snapshot = store
        .load(slot)
        .with_context(|| format!("loading save slot '{}'", slot))?;
    // Never run the clock backwards past the save.
    if snapshot.saved_at > clock.now() {
        clock.set(snapshot.saved_at);
    }
    Ok(Engine::restore(
        content,
        snapshot,
        rng_for(config),
        Arc::new(clock),
        config.engine.settings(),
    ))
}

/// Execute each action in order. `wait` advances the script clock before the
/// engine resolves timers. Rejections are reported and the script continues.
fn run_script(engine: &mut Engine, clock: &ManualClock, actions: Vec<Action>) -> Result<()> {
    for (step, action) in actions.into_iter().enumerate() {
        if let Action::Wait { seconds } = &action {
            let seconds = i64::try_from(*seconds).map_err(|_| anyhow!("step {}: wait too long", step + 1))?;
            clock.advance_secs(seconds);
        }
        match engine.execute(action) {
            Ok(outcome) => println!("{}", serde_json::to_string(&outcome)?),
            Err(err) => {
                warn!("step {} rejected: {}", step + 1, err);
                println!(
                    "{}",
                    serde_json::json!({ "rejected": err.reason(), "message": err.to_string() })
                );
            }
        }
    }
    Ok(())
}

fn print_status(engine: &Engine) {
    let c = engine.character();
    println!("{} the {} ({})", c.name, c.title, c.cultivation);
    println!(
        "Level {}  EXP {}/{}  HP {}/{}  MP {}/{}  Gold {}",
        c.level,
        c.experience,
        c.experience_to_next,
        c.hp,
        c.max_hp(),
        c.mp,
        c.max_mp(),
        c.gold
    );
    println!("ATK {}  DEF {}  AGI {}", c.attack(), c.defense(), c.agility());
    let location = engine.location().map(|l| l.name.as_str()).unwrap_or(c.location.as_str());
    println!("Location: {}", location);
    if let Some(rank) = engine.faction_rank() {
        println!(
            "Faction: {} ({}, standing {})",
            engine.content().faction_name(&rank.faction_id),
            rank.rank,
            rank.standing
        );
    }
    if let Some(progress) = engine.crafting_progress() {
        println!("Crafting: {:.0}%", progress);
    }
    if let Some(pending) = engine.pending_adventure() {
        println!("Adventure awaiting a choice: {}", pending.adventure_id);
    }
    for quest in engine.quests().active() {
        println!("Quest: {}", quest.name);
    }
    if !c.inventory.is_empty() {
        let items: Vec<String> = c
            .inventory
            .iter()
            .map(|(id, count)| format!("{} x{}", engine.content().item_name(id), count))
            .collect();
        println!("Inventory: {}", items.join(", "));
    }
}

fn print_log_tail(engine: &Engine) {
    for entry in engine.recent_log(LOG_TAIL) {
        println!(
            "[{}] {:<9} {}",
            entry.at.format("%H:%M:%S"),
            entry.category.as_str(),
            entry.one_line()
        );
    }
}

fn init_logging(config: Option<&Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    let configured = config
        .and_then(|cfg| cfg.logging.level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Warn);
    let level = match verbosity {
        0 => configured,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(level);

    let file = config
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|path| std::fs::OpenOptions::new().create(true).append(true).open(path).ok());
    match file {
        Some(f) => {
            let sink = std::sync::Arc::new(std::sync::Mutex::new(f));
            // Only echo to the console when attached to a terminal.
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = sink.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                writeln!(
                    fmt,
                    "{} [{}] {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.args()
                )
            });
        }
    }
    let _ = builder.try_init();
}
