//! Program startup: configuration, logging, plugin setup and command dispatch

use std::io::IsTerminal;
use std::sync::Arc;

use clap::Parser;

use crate::app::cli::display::{render_app_list, render_details, render_plugins};
use crate::app::cli::{Args, Command, FileConfig, Settings};
use crate::app::AppError;
use crate::core::cancel::CancellationToken;
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::init_logging;
use crate::core::version::{build_time, get_api_version, git_hash};
use crate::loader::api::PluginLoader;
use crate::notifications::api::{publish_quietly, Event, SystemEvent, SystemEventType};
use crate::plugin::api::{AppAction, PluginError, PluginManager, PluginResult};
use crate::record::api::{App, AppState, RefineFlags};

/// Run the command given on the command line and return the exit status
pub async fn startup() -> i32 {
    #[cfg(unix)]
    unsafe {
        // Die quietly when piped into `head` and friends
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    let args = Args::parse();
    let file = FileConfig::load(args.config_file.as_deref()).await;
    let file = match file {
        Ok(file) => file,
        Err(error) => {
            let use_color = args.color.unwrap_or_else(|| std::io::stderr().is_terminal());
            let _ = init_logging(args.log_level.as_deref(), args.log_format.as_deref(), None, use_color);
            return report(&AppError::from(error), "load configuration");
        }
    };

    let settings = Settings::merge(&args, file);
    let use_color = settings
        .color
        .unwrap_or_else(|| std::io::stdout().is_terminal());
    colored::control::set_override(use_color);

    let log_file = settings
        .log_file
        .as_ref()
        .map(|path| path.to_string_lossy().into_owned());
    if let Err(error) = init_logging(
        settings.log_level.as_deref(),
        settings.log_format.as_deref(),
        log_file.as_deref(),
        use_color,
    ) {
        eprintln!("Error: cannot initialise logging: {}", error);
        return AppError::Logging(error.to_string()).exit_code();
    }
    log::debug!(
        "softcenter {} (api {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        get_api_version(),
        build_time(),
        git_hash()
    );

    let command = args.command.name();
    match run(&args, &settings, use_color).await {
        Ok(()) => 0,
        Err(error) => report(&error, command),
    }
}

fn report(error: &AppError, context: &str) -> i32 {
    log_error_with_context(error, context);
    error.exit_code()
}

async fn run(args: &Args, settings: &Settings, use_color: bool) -> Result<(), AppError> {
    let manager = PluginManager::new(get_api_version());
    let registered = manager.discover_plugins(&settings.exclude_plugins).await?;
    log::debug!("Registered {} plugins", registered);
    manager
        .setup(settings.plugins.clone(), settings.color)
        .await?;
    let loader = PluginLoader::new(manager).await;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        })
    };

    let result = session(&loader, &args.command, settings, args.json, use_color, &cancel).await;
    interrupt.abort();

    println!("{}", result?);
    Ok(())
}

/// Execute one command between the startup and shutdown announcements, then
/// tear the loader down
pub(crate) async fn session(
    loader: &PluginLoader,
    command: &Command,
    settings: &Settings,
    json: bool,
    use_color: bool,
    cancel: &CancellationToken,
) -> Result<String, AppError> {
    let notifications = loader.notification_manager().clone();
    publish_quietly(
        &notifications,
        Event::System(SystemEvent::new(SystemEventType::Startup)),
    )
    .await;

    let result = execute(loader, command, settings, json, use_color, cancel).await;

    publish_quietly(
        &notifications,
        Event::System(SystemEvent::new(SystemEventType::Shutdown)),
    )
    .await;
    loader.shutdown().await;
    result
}

/// Run one command against the loader and render its output
pub(crate) async fn execute(
    loader: &PluginLoader,
    command: &Command,
    settings: &Settings,
    json: bool,
    use_color: bool,
    cancel: &CancellationToken,
) -> Result<String, AppError> {
    let output = match command {
        Command::Search { terms, refine } => {
            let apps = loader.search(&terms.join(" "), refine.flags(), cancel).await?;
            render_app_list(&apps, json, use_color)?
        }
        Command::Updates { refine } => {
            let apps = loader.get_updates(refine.flags(), cancel).await?;
            render_app_list(&apps, json, use_color)?
        }
        Command::DistroUpgrades { refine } => {
            let apps = loader.get_distro_upgrades(refine.flags(), cancel).await?;
            render_app_list(&apps, json, use_color)?
        }
        Command::Refresh { .. } => {
            loader
                .refresh(settings.cache_age, RefineFlags::DEFAULT, cancel)
                .await?;
            "Metadata refreshed.".to_string()
        }
        Command::Details { id, refine } => {
            let app = lookup(loader, id, refine.flags(), cancel).await?;
            render_details(&app, json, use_color)?
        }
        Command::File { path, refine } => {
            let app = loader.filename_to_app(path, refine.flags(), cancel).await?;
            render_details(&app, json, use_color)?
        }
        Command::Install { id } => act(loader, id, AppAction::Install, cancel).await?,
        Command::Remove { id } => act(loader, id, AppAction::Remove, cancel).await?,
        Command::Launch { id } => act(loader, id, AppAction::Launch, cancel).await?,
        Command::Plugins => render_plugins(&loader.plugins().await, json, use_color)?,
    };
    Ok(output)
}

/// Record for `id`, refined until some plugin has claimed it
async fn lookup(
    loader: &PluginLoader,
    id: &str,
    flags: RefineFlags,
    cancel: &CancellationToken,
) -> PluginResult<Arc<App>> {
    let app = loader.resolve(id).unwrap_or_else(|| App::new(id));
    loader.app_refine(&app, flags, cancel).await?;
    if app.state() == AppState::Unknown {
        return Err(PluginError::not_found(format!("No application '{}'", id)));
    }
    Ok(app)
}

async fn act(
    loader: &PluginLoader,
    id: &str,
    action: AppAction,
    cancel: &CancellationToken,
) -> PluginResult<String> {
    let app = lookup(loader, id, RefineFlags::DEFAULT, cancel).await?;
    loader.app_action(&app, action, cancel).await?;
    let name = app.name().unwrap_or_else(|| id.to_string());
    Ok(match action {
        AppAction::Install => format!("Installed {}", name),
        AppAction::Remove => format!("Removed {}", name),
        AppAction::Launch => format!("Launched {}", name),
        AppAction::SetRating => format!("Rated {}", name),
    })
}
