use anyhow::{Context, Result, bail};
use postlink_config::{BoardConfigs, BoardId, ConfigStore};
use postlink_engine::{Engine, MemoryStore, StorageGateway};
use postlink_syntax::{PostId, ThreadId};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::{env, fs, process};

const USAGE: &str = "Usage: postlink [--board ID] [--post ID] [--config PATH] [--known POST:THREAD,...] [FILE]";

/// Command-line options. The body comes from FILE or stdin.
#[derive(Debug, PartialEq, Eq)]
struct Options {
    board: BoardId,
    post: PostId,
    config: Option<PathBuf>,
    known: Vec<(PostId, ThreadId)>,
    input: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            board: BoardId::from("b"),
            post: PostId(1),
            config: None,
            known: Vec::new(),
            input: None,
        }
    }
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Options> {
    let mut options = Options::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().with_context(|| format!("{flag} needs a value"));
        match arg.as_str() {
            "--board" => options.board = BoardId(value("--board")?),
            "--post" => options.post = PostId(parse_id(&value("--post")?)?),
            "--config" => options.config = Some(PathBuf::from(value("--config")?)),
            "--known" => {
                for pair in value("--known")?.split(',').filter(|p| !p.is_empty()) {
                    let (post, thread) = pair
                        .split_once(':')
                        .with_context(|| format!("expected POST:THREAD, got {pair:?}"))?;
                    options
                        .known
                        .push((PostId(parse_id(post)?), ThreadId(parse_id(thread)?)));
                }
            }
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            _ if options.input.is_some() => bail!("only one input file may be given"),
            _ => options.input = Some(PathBuf::from(&arg)),
        }
    }
    Ok(options)
}

fn parse_id(text: &str) -> Result<u64> {
    text.trim()
        .parse()
        .with_context(|| format!("{text:?} is not a valid ID"))
}

fn read_body(input: Option<&PathBuf>) -> Result<String> {
    match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut body = String::new();
            std::io::stdin().read_to_string(&mut body)?;
            Ok(body)
        }
    }
}

fn load_configs(path: Option<&PathBuf>) -> Result<BoardConfigs> {
    let Some(path) = path else {
        return Ok(BoardConfigs::default());
    };
    match BoardConfigs::load_from_path(path)? {
        Some(configs) => Ok(configs),
        None => bail!("config file {} not found", path.display()),
    }
}

fn run(options: Options) -> Result<()> {
    let configs = load_configs(options.config.as_ref())?;
    let body = read_body(options.input.as_ref())?;

    let store = MemoryStore::new();
    for (post, thread) in &options.known {
        store.insert_post(*post, *thread);
    }
    let store: Arc<dyn StorageGateway> = Arc::new(store);
    let engine = Engine::new(Arc::new(ConfigStore::new(configs)), store);

    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    let result = runtime.block_on(engine.parse_and_persist(
        &body,
        &options.board,
        options.post,
        &[],
    ))?;

    for diagnostic in &result.diagnostics {
        log::info!("{diagnostic}");
    }
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let options = match parse_args(env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {e:#}");
            eprintln!("{USAGE}");
            process::exit(1);
        }
    };
    log::debug!("options: {options:?}");

    run(options)
}
