use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use safeinterview_session::config::{Config, LogFormat};
use safeinterview_session::metrics::render_metrics;
use safeinterview_session::models::anticheat::KeyPress;
use safeinterview_session::models::task::Sample;
use safeinterview_session::models::{BrowserSignal, Route};
use safeinterview_session::services::consent::ConsentForm;
use safeinterview_session::services::session_service::{SessionCommand, SessionView};
use safeinterview_session::services::SessionRuntime;

const USAGE: &str =
    "usage: safeinterview-session <token> [--accept-rules] [--accept-tracking] [--decline] [--print-metrics]";

#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    token: String,
    accept_rules: bool,
    accept_tracking: bool,
    decline: bool,
    print_metrics: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Option<Args> {
    let mut parsed = Args::default();
    for arg in args {
        match arg.as_str() {
            "--accept-rules" => parsed.accept_rules = true,
            "--accept-tracking" => parsed.accept_tracking = true,
            "--decline" => parsed.decline = true,
            "--print-metrics" => parsed.print_metrics = true,
            flag if flag.starts_with("--") => return None,
            token if parsed.token.is_empty() => parsed.token = token.to_string(),
            _ => return None,
        }
    }
    (!parsed.token.is_empty()).then_some(parsed)
}

#[derive(Debug, PartialEq, Eq)]
enum DriverInput {
    Command(SessionCommand),
    Signal(BrowserSignal),
}

fn parse_line(line: &str) -> Option<DriverInput> {
    let line = line.trim();
    let (head, rest) = line.split_once(' ').unwrap_or((line, ""));

    let command = match head {
        "next" => SessionCommand::Next,
        "prev" | "previous" => SessionCommand::Previous,
        "submit" => SessionCommand::Submit,
        "dismiss" => SessionCommand::DismissWarning,
        "quit" | "exit" => SessionCommand::Teardown,
        "edit" => SessionCommand::Edit(rest.replace("\\n", "\n")),
        "signal" => return Some(DriverInput::Signal(parse_signal(rest.trim()))),
        _ => return None,
    };
    Some(DriverInput::Command(command))
}

fn parse_signal(name: &str) -> BrowserSignal {
    match name {
        "tab_hidden" => BrowserSignal::VisibilityChange { hidden: true },
        "tab_visible" => BrowserSignal::VisibilityChange { hidden: false },
        "blur" | "window_blur" => BrowserSignal::WindowBlur,
        "contextmenu" | "context_menu" => BrowserSignal::ContextMenu,
        "copy" => BrowserSignal::Copy,
        "paste" => BrowserSignal::Paste,
        "f12" => BrowserSignal::KeyDown(KeyPress::plain("F12")),
        "ctrl+shift+i" => BrowserSignal::KeyDown(KeyPress::ctrl_shift("I")),
        other => BrowserSignal::KeyDown(KeyPress::plain(other)),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "safeinterview_session=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn format_sample(sample: &Sample) -> String {
    let mut parts = Vec::new();
    if let Some(input) = sample.input.as_deref() {
        parts.push(format!("input: {}", input));
    }
    if let Some(output) = sample.output.as_deref() {
        parts.push(format!("output: {}", output));
    }
    format!("  {}", parts.join("  "))
}

fn print_view(view: &SessionView) {
    println!(
        "[{}/{}] {} ({}) {} left",
        view.position, view.total, view.title, view.level, view.remaining
    );
    println!("{}", view.prompt);
    for sample in &view.samples {
        println!("{}", format_sample(sample));
    }
    println!("> {}", view.submit_label);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    init_tracing(config.log_format);

    let Some(args) = parse_args(std::env::args().skip(1)) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let mut consent = ConsentForm::new();
    consent.set_rules_accepted(args.accept_rules);
    consent.set_tracking_accepted(args.accept_tracking);

    if args.decline {
        println!("{}", consent.decline().path(&args.token));
        return Ok(());
    }
    if consent.start().is_none() {
        eprintln!("Both the interview rules and activity tracking must be accepted to start.");
        println!("{}", Route::Consent.path(&args.token));
        return Ok(());
    }

    tracing::info!("Starting interview session for token {}", args.token);
    let runtime = SessionRuntime::new(config).await?;
    let mut controller = runtime.controller(&args.token);

    controller.load().await;
    if let Some(error) = controller.load_error() {
        println!("{}", error.message());
        return Ok(());
    }
    if let Some(view) = controller.view() {
        print_view(&view);
    }

    let (commands, rx) = mpsc::unbounded_channel();
    let signals = controller.signal_handle();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_line(&line) {
                Some(DriverInput::Command(command)) => {
                    if commands.send(command).is_err() {
                        break;
                    }
                }
                Some(DriverInput::Signal(signal)) => {
                    let action = signals.dispatch(signal);
                    tracing::debug!("Signal default action: {:?}", action);
                }
                None => eprintln!("unrecognized input: {}", line),
            }
        }
    });

    let route = tokio::select! {
        route = controller.run(rx) => route,
        _ = tokio::signal::ctrl_c() => None,
    };

    match route {
        Some(route) => {
            if let Some(reason) = controller.stop_reason() {
                println!("{}", reason);
            }
            println!("{}", route.path(&args.token));
            if let Some(result) = route.submission_result() {
                println!("{}", serde_json::to_string_pretty(result)?);
            }
        }
        None => {
            controller.teardown();
            tracing::info!("Session closed before completion");
        }
    }

    if args.print_metrics {
        print!("{}", render_metrics()?);
    }

    Ok(())
}
