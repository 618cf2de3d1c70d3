// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod render;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use dbgear_app::{
    Backend, DataSettingsFormInput, DataTab, EnvironFormInput, FillAssistant, FillMethod,
    MappingId, NoticeLog, Route, TableRef,
};
use dbgear_client::Client;
use dbgear_llm::ChatClient;
use runtime::Session;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_ENV: &str = "DBGEAR_LOG";

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    init_logging(options.verbose)?;

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `dbgear --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let notices = Arc::new(NoticeLog::new());
    let client = Client::new(config.server_base_url(), config.server_timeout()?)
        .with_context(|| {
            format!(
                "invalid [server] config in {}; fix base_url/timeout values",
                options.config_path.display()
            )
        })?
        .with_notifier(notices.clone());

    let mut assistant = if config.llm_enabled() {
        let api_key = config.llm_api_key();
        Some(
            ChatClient::new(
                config.llm_base_url(),
                config.llm_model(),
                api_key.as_deref(),
                config.llm_timeout()?,
            )
            .with_context(|| {
                format!(
                    "invalid [llm] config in {}; fix base_url/model/timeout values",
                    options.config_path.display()
                )
            })?,
        )
    } else {
        None
    };

    if options.check_only {
        let mut client = client;
        let project = client.project_info().with_context(|| {
            format!(
                "reach {} -- is the server running? set [server].base_url otherwise",
                config.server_base_url()
            )
        })?;
        println!("server ok: project {}", project.project_name);
        if let Some(assistant) = &assistant {
            assistant.ping()?;
            println!("llm ok: {}", assistant.model());
        }
        return Ok(());
    }

    let Some(command) = options.command else {
        print_help();
        return Ok(());
    };

    let mut session = Session::with_notices(
        client,
        notices,
        config.page_size(),
        config.show_all_columns(),
    );
    session.bootstrap()?;
    debug!(server = %session.backend().base_url(), "session ready");

    let outcome = execute(
        &mut session,
        command,
        assistant
            .as_mut()
            .map(|assistant| assistant as &mut dyn FillAssistant),
    );
    eprint!("{}", render::render_notices(&session.notices().drain()));
    print!("{}", outcome?);
    Ok(())
}

fn execute(
    session: &mut Session<Client>,
    command: Command,
    assistant: Option<&mut dyn FillAssistant>,
) -> Result<String> {
    match command {
        Command::Project => {
            let project = session
                .store()
                .project_info()
                .ok_or_else(|| anyhow!("server returned no project info"))?;
            Ok(render::render_project(project))
        }
        Command::Environs => Ok(render::render_environs(session.store().environs())),
        Command::Tables(id) => Ok(render::render_data_list(session.data_list(&id)?)),
        Command::Candidates(id) => Ok(render::render_data_list(&session.candidates(&id)?)),
        Command::Schema(table) => Ok(render::render_schema(&session.schema(&table)?)),
        Command::Show(path) => match session.navigate(&path)? {
            Route::Table {
                tab: DataTab::Props,
                ..
            } => Ok(render::render_settings(session.resolver().columns())),
            Route::Table { .. } => Ok(render::render_grid(session.grid())),
            _ => Ok(render::render_data_list(session.store().data_list())),
        },
        Command::Settings { id, table } => Ok(render::render_settings(
            session.resolve_settings(&id, &table)?,
        )),
        Command::Bind { id, table } => {
            let columns = session.resolve_settings(&id, &table)?.len();
            let table = session.submit_settings(
                &id,
                DataSettingsFormInput {
                    table: table.to_string(),
                    ..DataSettingsFormInput::default()
                },
            )?;
            Ok(format!("bound {table} to {id} ({columns} columns)\n"))
        }
        Command::Environ(input) => {
            let id = session.save_environ(input)?;
            Ok(render::render_environs(session.store().environs())
                + &format!("saved environment {id}\n"))
        }
        Command::Fill {
            path,
            column,
            method,
            value,
        } => {
            session.navigate(&path)?;
            let outcome = session.fill(method, &column, &value, assistant)?;
            let mut out = String::new();
            if let Some(reply) = outcome.reply.filter(|reply| !reply.is_empty()) {
                out.push_str(&format!("{reply}\n"));
            }
            if outcome.filled == 0 {
                out.push_str("nothing filled\n");
                return Ok(out);
            }
            let saved = session.save()?;
            out.push_str(&format!(
                "filled {} cells of {}, saved {saved} rows\n",
                outcome.filled,
                outcome.column.unwrap_or(column)
            ));
            Ok(out)
        }
        Command::Append(path) => {
            session.navigate(&path)?;
            let key = session.append()?;
            let saved = session.save()?;
            Ok(format!(
                "appended row {}, saved {saved} rows\n",
                key.unwrap_or_default()
            ))
        }
        Command::Import {
            path,
            host,
            sql,
            segment,
        } => {
            session.navigate(&path)?;
            session.import(&host, &sql, segment.as_deref())?;
            Ok(render::render_grid(session.grid()))
        }
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();
    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);
    tracing_subscriber::registry()
        .with(stderr)
        .try_init()
        .context("install log subscriber")?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Project,
    Environs,
    Tables(MappingId),
    Candidates(MappingId),
    Schema(TableRef),
    Show(String),
    Settings {
        id: MappingId,
        table: TableRef,
    },
    Bind {
        id: MappingId,
        table: TableRef,
    },
    Environ(EnvironFormInput),
    Fill {
        path: String,
        column: String,
        method: FillMethod,
        value: String,
    },
    Append(String),
    Import {
        path: String,
        host: String,
        sql: String,
        segment: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    verbose: bool,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
    command: Option<Command>,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        verbose: false,
        print_config_path: false,
        print_example: false,
        check_only: false,
        show_help: false,
        command: None,
    };

    let mut positional = Vec::new();
    let mut segment = None;
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--segment" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--segment requires a segment value"))?;
                segment = Some(value.as_ref().to_owned());
            }
            "--verbose" | "-v" => {
                options.verbose = true;
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            flag if flag.starts_with('-') && flag.len() > 1 => {
                bail!("unknown argument {flag:?}; run with --help to see supported options");
            }
            value => positional.push(value.to_owned()),
        }
    }

    if !positional.is_empty() {
        options.command = Some(parse_command(&positional, segment)?);
    } else if segment.is_some() {
        bail!("--segment only applies to the import command");
    }
    Ok(options)
}

fn parse_command(words: &[String], segment: Option<String>) -> Result<Command> {
    let (name, rest) = words
        .split_first()
        .ok_or_else(|| anyhow!("missing command; run with --help"))?;
    if segment.is_some() && name.as_str() != "import" {
        bail!("--segment only applies to the import command");
    }
    let command = match (name.as_str(), rest) {
        ("project", []) => Command::Project,
        ("environs", []) => Command::Environs,
        ("tables", [id]) => Command::Tables(MappingId::new(id.as_str())),
        ("candidates", [id]) => Command::Candidates(MappingId::new(id.as_str())),
        ("schema", [table]) => Command::Schema(table.parse()?),
        ("show", [path]) => Command::Show(path.clone()),
        ("settings", [id, table]) => Command::Settings {
            id: MappingId::new(id.as_str()),
            table: table.parse()?,
        },
        ("bind", [id, table]) => Command::Bind {
            id: MappingId::new(id.as_str()),
            table: table.parse()?,
        },
        ("environ", [id, name, instance]) => Command::Environ(environ_input(id, name, instance)),
        ("environ", [id, name, instance, base]) => Command::Environ(EnvironFormInput {
            base: base.clone(),
            ..environ_input(id, name, instance)
        }),
        ("fill", [path, column, method, value]) => Command::Fill {
            path: path.clone(),
            column: column.clone(),
            method: FillMethod::parse(method).ok_or_else(|| {
                anyhow!("unknown fill method {method:?}; use single, multiple, or ai")
            })?,
            value: value.clone(),
        },
        ("append", [path]) => Command::Append(path.clone()),
        ("import", [path, host, sql]) => Command::Import {
            path: path.clone(),
            host: host.clone(),
            sql: sql.clone(),
            segment,
        },
        (
            "project" | "environs" | "tables" | "candidates" | "schema" | "show" | "settings"
            | "bind" | "environ" | "fill" | "append" | "import",
            _,
        ) => bail!("wrong number of arguments for {name:?}; run with --help for usage"),
        (unknown, _) => {
            bail!("unknown command {unknown:?}; run with --help to see supported commands")
        }
    };
    Ok(command)
}

fn environ_input(id: &str, name: &str, instance: &str) -> EnvironFormInput {
    EnvironFormInput {
        id: id.to_owned(),
        name: name.to_owned(),
        instance: instance.to_owned(),
        ..EnvironFormInput::default()
    }
}

fn print_help() {
    println!("dbgear (Rust)");
    println!("usage: dbgear [options] <command>");
    println!();
    println!("commands:");
    println!("  project                                   Show project info, rules, bindings");
    println!("  environs                                  List environments by group");
    println!("  tables <environ>                          List tables bound to an environment");
    println!("  candidates <environ>                      List tables that can be bound");
    println!("  schema <instance>.<table>                 Show a table schema");
    println!("  show <path>                               Print the grid at a data path");
    println!("  settings <environ> <instance>.<table>     Print resolved column defaults");
    println!("  bind <environ> <instance>.<table>         Bind a table with resolved defaults");
    println!("  environ <id> <name> <instance> [base]     Create or update an environment");
    println!("  fill <path> <column> <method> <value>     Fill (single|multiple|ai) and save");
    println!("  append <path>                             Append a row and save");
    println!("  import <path> <host> <sql>                Import rows from a SQL query");
    println!();
    println!("options:");
    println!("  --config <path>          Use a specific config path");
    println!("  --segment <value>        Segment to import into");
    println!("  --verbose, -v            Log requests to stderr (or set {LOG_ENV})");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --check                  Validate config and reach the server");
    println!("  --help                   Show this help");
}
