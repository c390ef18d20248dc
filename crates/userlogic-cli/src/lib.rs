use serde::Deserialize;
use serde_json::{Map, Value as Json};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use userlogic_core::{
    build_logic_map_with, collect_lookups, InheritingResolver, Logic, LogicOptions, Object,
    PathResolver, Value,
};

const LOG_ENV: &str = "USERLOGIC_LOG";
const DEFAULT_LOG: &str = "warn,userlogic::debug=info";

#[derive(Debug, Clone, PartialEq)]
enum CliCommand {
    Eval { input: Input },
    Map { input: Input },
    Lookups { definition: String },
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Input {
    definition: String,
    data: Option<String>,
    config: Option<PathBuf>,
    inherit_key: Option<String>,
    log: Option<String>,
}

/// Settings read from `--config PATH`. Command-line flags win over the file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Keys every evaluation starts from.
    pub base_context: Map<String, Json>,
    /// Enables inherited lookups through this key.
    pub inherit_key: Option<String>,
    /// Tracing filter directive, e.g. `userlogic=trace`.
    pub log: Option<String>,
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content =
            fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        serde_json::from_str(&content)
            .map_err(|e| format!("failed to parse {} as config: {e}", path.display()))
    }

    fn logic_options(&self) -> LogicOptions<'static> {
        let base_context = Value::from(Json::Object(self.base_context.clone()))
            .as_object()
            .cloned()
            .unwrap_or_else(Object::new);
        let resolver = self
            .inherit_key
            .as_ref()
            .map(|key| Arc::new(InheritingResolver::new(key.clone())) as Arc<dyn PathResolver>);
        LogicOptions {
            base_context: Some(base_context),
            resolver,
            ..Default::default()
        }
    }
}

pub fn run_from_env() -> Result<(), String> {
    let output = run_from_args(env::args().skip(1).collect())?;
    println!("{output}");
    Ok(())
}

/// Run one command and return the pretty-printed JSON result.
pub fn run_from_args(args: Vec<String>) -> Result<String, String> {
    let output = match parse_command(args)? {
        CliCommand::Eval { input } => {
            let config = prepare(&input)?;
            let definition = load_json(&input.definition, "definition")?;
            let logic = Logic::with_options(&definition, config.logic_options())
                .map_err(|e| e.to_string())?;
            logic
                .evaluate_json(&load_data(input.data.as_deref())?)
                .map_err(|e| e.to_string())?
        }
        CliCommand::Map { input } => {
            let config = prepare(&input)?;
            let definition = load_json(&input.definition, "definition")?;
            let map = build_logic_map_with(&definition, &mut |d: &Json| {
                Logic::with_options(d, config.logic_options())
            })
            .map_err(|e| e.to_string())?;
            let context = Value::from(load_data(input.data.as_deref())?);
            map.evaluate(&context).map_err(|e| e.to_string())?.to_json()
        }
        CliCommand::Lookups { definition } => {
            let definition = load_json(&definition, "definition")?;
            let paths = collect_lookups(&definition).map_err(|e| e.to_string())?;
            Json::Array(paths.into_iter().map(|p| Json::String(p.join("."))).collect())
        }
    };
    serde_json::to_string_pretty(&output).map_err(|e| e.to_string())
}

/// Merge config file and flags, then install logging.
fn prepare(input: &Input) -> Result<CliConfig, String> {
    let mut config = match &input.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    if input.inherit_key.is_some() {
        config.inherit_key = input.inherit_key.clone();
    }
    if input.log.is_some() {
        config.log = input.log.clone();
    }
    init_tracing(config.log.as_deref());
    tracing::debug!(
        base_keys = config.base_context.len(),
        inherit_key = ?config.inherit_key,
        "configuration loaded"
    );
    Ok(config)
}

static TRACING_INIT: Once = Once::new();

/// Install the stderr subscriber. The filter comes from `directive`, then
/// `USERLOGIC_LOG`, then `RUST_LOG`, then a default that shows `debug`
/// operation output.
pub fn init_tracing(directive: Option<&str>) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = match directive {
            Some(directive) => EnvFilter::new(directive),
            None => EnvFilter::try_from_env(LOG_ENV)
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG)),
        };
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(filter)
            .try_init();
    });
}

fn parse_command(args: Vec<String>) -> Result<CliCommand, String> {
    if args.is_empty() {
        return Err(help_text());
    }

    let cmd = args[0].as_str();
    match cmd {
        "eval" => Ok(CliCommand::Eval {
            input: parse_input(&args)?,
        }),
        "map" => Ok(CliCommand::Map {
            input: parse_input(&args)?,
        }),
        "lookups" => parse_lookups(&args),
        "help" | "--help" | "-h" => Err(help_text()),
        _ => Err(format!("unknown command: {cmd}\n\n{}", help_text())),
    }
}

fn parse_input(args: &[String]) -> Result<Input, String> {
    let mut definition: Option<String> = None;
    let mut input = Input::default();

    let mut i = 1usize;
    while i < args.len() {
        let token = &args[i];
        match token.as_str() {
            "--data" => input.data = Some(flag_value(args, &mut i, "--data")?),
            "--config" => input.config = Some(PathBuf::from(flag_value(args, &mut i, "--config")?)),
            "--inherit" => input.inherit_key = Some(flag_value(args, &mut i, "--inherit")?),
            "--log" => input.log = Some(flag_value(args, &mut i, "--log")?),
            x if x.starts_with("--") => return Err(format!("unknown flag: {x}")),
            _ => {
                if definition.is_some() {
                    return Err("only one FILE positional argument is allowed".to_string());
                }
                definition = Some(token.clone());
            }
        }
        i += 1;
    }

    input.definition = definition.ok_or_else(|| format!("{} requires FILE", args[0]))?;
    Ok(input)
}

fn parse_lookups(args: &[String]) -> Result<CliCommand, String> {
    match &args[1..] {
        [definition] if !definition.starts_with("--") => Ok(CliCommand::Lookups {
            definition: definition.clone(),
        }),
        _ => Err("lookups requires exactly one FILE argument".to_string()),
    }
}

fn flag_value(args: &[String], i: &mut usize, flag: &str) -> Result<String, String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn help_text() -> String {
    [
        "userlogic CLI",
        "",
        "Commands:",
        "  userlogic eval FILE [--data JSON_OR_PATH] [--config PATH] [--inherit KEY] [--log FILTER]",
        "  userlogic map FILE [--data JSON_OR_PATH] [--config PATH] [--inherit KEY] [--log FILTER]",
        "  userlogic lookups FILE",
        "",
        "FILE and --data accept a path or inline JSON.",
    ]
    .join("\n")
}

/// Parse `input` as a JSON file when the path exists, else as inline JSON.
fn load_json(input: &str, what: &str) -> Result<Json, String> {
    let as_path = PathBuf::from(input);
    if as_path.is_file() {
        let content = fs::read_to_string(&as_path)
            .map_err(|e| format!("failed to read {}: {e}", as_path.display()))?;
        return serde_json::from_str(&content)
            .map_err(|e| format!("invalid JSON in {}: {e}", as_path.display()));
    }
    serde_json::from_str(input).map_err(|e| format!("invalid {what} JSON: {e}"))
}

fn load_data(data: Option<&str>) -> Result<Json, String> {
    match data {
        Some(input) => load_json(input, "--data"),
        None => Ok(Json::Object(Map::new())),
    }
}
