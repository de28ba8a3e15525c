//! Coursework Workbench Shell
//!
//! Line-oriented front end over the three collections. Each command is one
//! user action: it reads the store, optionally calls a computation service,
//! and prints the result. A failed action is reported and the shell keeps
//! running.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `WORKBENCH_DATA_DIR`: Directory holding the documents (default: `data`)
//! - `WORKBENCH_BIN_DIR`: Directory holding the topic programs (default: `build`)
//! - `WORKBENCH_BRIDGE_TIMEOUT_SECS`: Per-call limit, `0` disables (default: 30)
//! - `WORKBENCH_DUPLICATE_KEYS`: `reject` or `allow` (default: reject)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: pretty)
//!
//! Logs go to stderr so they never interleave with command output.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use coursework_kernel::{
    BridgeResponse, Collection, DictionaryEntry, Edge, FileBackend, Intent, Location, LocationId,
    PathOutcome, ProcessBridge, RequestContext, SearchResult, SegmentedStore, ServiceName,
    ServiceOutput, SortKey, StudentRecord, Workbench, WorkbenchConfig, WorkbenchError,
};

type Shell = Workbench<FileBackend, ProcessBridge>;

const HELP: &str = "\
students                         list students
add-student <id> <name> <score>  add a student
rm-student <id>                  remove a student
sort <id|score>                  sort students via the service
words                            list dictionary entries
add-word <word> <meaning>        add an entry
rm-word <word>                   remove an entry
lookup <word>                    look up a meaning via the service
fuzzy <prefix>                   prefix search via the service
tree                             print the local search tree
remote-tree                      print the service's tree
map                              list locations and edges
add-location <id> <pop> <name> [info]
add-edge <from> <to> <weight>
rm-location <id>                 remove a location (edges are kept)
rm-edge <a> <b>                  remove edges between two locations
graph                            print the local graph model
path <from> <to>                 shortest path via the service
remote-locations                 list locations via the service
remote-edges                     list edges via the service
help                             show this text
quit                             exit";

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "workbench_shell=info,coursework_kernel=info".into());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

/// Failure of one shell command.
#[derive(Debug, thiserror::Error)]
enum CommandError {
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("not a number: {0}")]
    Number(String),
    #[error("unknown command: {0} (try `help`)")]
    Unknown(String),
    #[error(transparent)]
    Workbench(#[from] WorkbenchError),
}

fn number<T: std::str::FromStr>(raw: &str) -> Result<T, CommandError> {
    raw.parse().map_err(|_| CommandError::Number(raw.to_string()))
}

fn split_first(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim()),
        None => (s, ""),
    }
}

/// Run one command line, returning the text to print.
async fn dispatch(shell: &Shell, line: &str) -> Result<String, CommandError> {
    let (command, rest) = split_first(line);
    let words: Vec<&str> = rest.split_whitespace().collect();

    let out = match command {
        "help" => HELP.to_string(),

        // ── students ──
        "students" => {
            let ctx = RequestContext::new(Intent::Browse(Collection::Students));
            render_students(&shell.students(&ctx).await?)
        }
        "add-student" => {
            let [id, name, score] = words[..] else {
                return Err(CommandError::Usage("add-student <id> <name> <score>"));
            };
            let ctx = RequestContext::new(Intent::Add(Collection::Students));
            shell
                .add_student(&ctx, StudentRecord::new(id, name, number(score)?))
                .await?;
            format!("added student {id}")
        }
        "rm-student" => {
            let [id] = words[..] else {
                return Err(CommandError::Usage("rm-student <id>"));
            };
            let ctx = RequestContext::new(Intent::Remove(Collection::Students));
            removal(shell.remove_student(&ctx, id).await?.is_found(), id)
        }
        "sort" => {
            let key = match words[..] {
                ["id"] => SortKey::Id,
                ["score"] => SortKey::Score,
                _ => return Err(CommandError::Usage("sort <id|score>")),
            };
            let ctx = RequestContext::new(Intent::Compute(key.service()));
            render_output(shell.sorted_students(&ctx, key).await?, |s| render_students(&s))
        }

        // ── dictionary ──
        "words" => {
            let ctx = RequestContext::new(Intent::Browse(Collection::Dictionary));
            shell
                .words(&ctx)
                .await?
                .iter()
                .map(|e| format!("{}: {}", e.word, e.meaning))
                .collect::<Vec<_>>()
                .join("\n")
        }
        "add-word" => {
            let (word, meaning) = split_first(rest);
            if word.is_empty() || meaning.is_empty() {
                return Err(CommandError::Usage("add-word <word> <meaning>"));
            }
            let ctx = RequestContext::new(Intent::Add(Collection::Dictionary));
            shell
                .add_word(&ctx, DictionaryEntry::new(word, meaning))
                .await?;
            format!("added word {word}")
        }
        "rm-word" => {
            let [word] = words[..] else {
                return Err(CommandError::Usage("rm-word <word>"));
            };
            let ctx = RequestContext::new(Intent::Remove(Collection::Dictionary));
            removal(shell.remove_word(&ctx, word).await?.is_found(), word)
        }
        "lookup" => {
            let [word] = words[..] else {
                return Err(CommandError::Usage("lookup <word>"));
            };
            let ctx = RequestContext::new(Intent::Compute(ServiceName::Search));
            match shell.lookup(&ctx, word).await? {
                SearchResult::Found(meaning) => format!("{word}: {meaning}"),
                SearchResult::Missing(message) => message,
            }
        }
        "fuzzy" => {
            let [prefix] = words[..] else {
                return Err(CommandError::Usage("fuzzy <prefix>"));
            };
            let ctx = RequestContext::new(Intent::Compute(ServiceName::Fuzzy));
            let candidates = shell.fuzzy(&ctx, prefix).await?;
            if candidates.is_empty() {
                "no matches".to_string()
            } else {
                candidates.join("\n")
            }
        }
        "tree" => {
            let ctx = RequestContext::new(Intent::Visualize(Collection::Dictionary));
            let tree = shell.dictionary_tree(&ctx).await?;
            let mut lines: Vec<String> = tree
                .links()
                .iter()
                .map(|l| format!("{} -{:?}-> {}", l.parent, l.side, l.child))
                .collect();
            if let Some(root) = tree.root() {
                lines.insert(0, format!("root: {root} ({} nodes, height {})", tree.len(), tree.height()));
            }
            if !tree.skipped().is_empty() {
                lines.push(format!("duplicates skipped: {}", tree.skipped().join(", ")));
            }
            lines.join("\n")
        }
        "remote-tree" => {
            let ctx = RequestContext::new(Intent::Compute(ServiceName::PrintTree));
            render_output(shell.remote_tree(&ctx).await?, |tree| {
                tree.nodes
                    .iter()
                    .map(|n| format!("{}{}", "  ".repeat(n.depth), n.label))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }

        // ── campus map ──
        "map" => {
            let ctx = RequestContext::new(Intent::Browse(Collection::Map));
            let contents = shell.map(&ctx).await?;
            let mut lines = vec!["LOCATIONS".to_string()];
            lines.extend(contents.locations.iter().map(|l| {
                format!("{} {} {} {}", l.id, l.popularity, l.name, l.info)
                    .trim_end()
                    .to_string()
            }));
            lines.push("EDGES".to_string());
            lines.extend(
                contents
                    .edges
                    .iter()
                    .map(|e| format!("{} {} {}", e.from, e.to, e.weight)),
            );
            lines.join("\n")
        }
        "add-location" => {
            let (id, rest) = split_first(rest);
            let (popularity, rest) = split_first(rest);
            let (name, info) = split_first(rest);
            if name.is_empty() {
                return Err(CommandError::Usage("add-location <id> <pop> <name> [info]"));
            }
            let ctx = RequestContext::new(Intent::Add(Collection::Map));
            shell
                .add_location(&ctx, Location::new(id, number(popularity)?, name, info))
                .await?;
            format!("added location {id}")
        }
        "add-edge" => {
            let [from, to, weight] = words[..] else {
                return Err(CommandError::Usage("add-edge <from> <to> <weight>"));
            };
            let ctx = RequestContext::new(Intent::Add(Collection::Map));
            shell
                .add_edge(&ctx, Edge::new(from, to, number(weight)?))
                .await?;
            format!("added edge {from} {to}")
        }
        "rm-location" => {
            let [id] = words[..] else {
                return Err(CommandError::Usage("rm-location <id>"));
            };
            let ctx = RequestContext::new(Intent::Remove(Collection::Map));
            let found = shell
                .remove_location(&ctx, &LocationId::new(id))
                .await?
                .is_found();
            removal(found, id)
        }
        "rm-edge" => {
            let [a, b] = words[..] else {
                return Err(CommandError::Usage("rm-edge <a> <b>"));
            };
            let ctx = RequestContext::new(Intent::Remove(Collection::Map));
            let found = shell
                .remove_edges(&ctx, &LocationId::new(a), &LocationId::new(b))
                .await?
                .is_found();
            removal(found, &format!("{a}-{b}"))
        }
        "graph" => {
            let ctx = RequestContext::new(Intent::Visualize(Collection::Map));
            let graph = shell.campus_graph(&ctx).await?;
            let mut lines: Vec<String> = graph
                .nodes
                .iter()
                .map(|n| {
                    let marker = if n.synthesized { " (no record)" } else { "" };
                    format!("[{}] {}{marker}", n.id, n.label)
                })
                .collect();
            lines.extend(
                graph
                    .edges
                    .iter()
                    .map(|e| format!("{} --{}-- {}", e.from, e.label, e.to)),
            );
            lines.join("\n")
        }
        "path" => {
            let [from, to] = words[..] else {
                return Err(CommandError::Usage("path <from> <to>"));
            };
            let ctx = RequestContext::new(Intent::Compute(ServiceName::Path));
            match shell
                .shortest_path(&ctx, &LocationId::new(from), &LocationId::new(to))
                .await?
            {
                PathOutcome::Path(path) => format!("{}\n{}", path.hops().join(" -> "), path.distance),
                PathOutcome::Informational(message) => message,
            }
        }
        "remote-locations" => {
            let ctx = RequestContext::new(Intent::Compute(ServiceName::Locations));
            render_output(shell.remote_locations(&ctx).await?, |locations| {
                locations
                    .iter()
                    .map(|l| format!("{} {} ({})", l.id, l.name, l.popularity))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        "remote-edges" => {
            let ctx = RequestContext::new(Intent::Compute(ServiceName::Edges));
            render_output(shell.remote_edges(&ctx).await?, |edges| {
                edges
                    .iter()
                    .map(|e| format!("{} {} {}", e.from, e.to, e.weight))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }

        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(out)
}

fn render_students(students: &[StudentRecord]) -> String {
    students
        .iter()
        .map(|s| format!("{:<8} {:<12} {}", s.id, s.name, s.score))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render typed output, or the service's own text when it did not match.
fn render_output<T>(output: ServiceOutput<T>, render: impl FnOnce(T) -> String) -> String {
    match output {
        ServiceOutput::Typed(value) => render(value),
        ServiceOutput::Untyped {
            raw,
            shape: BridgeResponse::Text(_),
            ..
        } => raw,
        ServiceOutput::Untyped { raw, reason, .. } => format!("(unexpected output: {reason})\n{raw}"),
    }
}

fn removal(found: bool, key: &str) -> String {
    if found {
        format!("removed {key}")
    } else {
        format!("{key} not found")
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = WorkbenchConfig::from_env();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.store.data_dir.display(),
        duplicates = ?config.duplicates,
        "Starting workbench shell"
    );

    tokio::fs::create_dir_all(&config.store.data_dir).await?;
    let backend = Arc::new(FileBackend::new(config.store.clone()));
    let store = SegmentedStore::new(backend, config.duplicates);
    let bridge = Arc::new(ProcessBridge::from_config(&config.bridge));
    let shell = Workbench::new(store, bridge);

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit") {
            break;
        }

        let text = match dispatch(&shell, line).await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(error = %e, "Command failed");
                format!("error: {e}")
            }
        };
        stdout.write_all(text.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
    }

    info!("Workbench shell exiting");
    Ok(())
}
