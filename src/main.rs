use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use tracing::{info, warn};
use vilij::prelude::*;

const SAMPLE: &str = "\
@p1\tsetosa\t1.4,0.2
@p2\tsetosa\t1.3,0.3
@p3\tsetosa\t1.5,0.2
@p4\tversicolor\t4.7,1.4
@p5\tversicolor\t4.5,1.5
@p6\tversicolor\t4.9,1.5
";

const IDLE_POLL: Duration = Duration::from_secs(30);

struct Args {
    kind: AlgorithmKind,
    file: Option<PathBuf>,
    request: RunRequest,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args
        .first()
        .is_some_and(|a| a == "--help" || a == "-h" || a == "help")
    {
        print_help();
        return ExitCode::SUCCESS;
    }

    let args = match parse_args(&args) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            print_help();
            return ExitCode::from(2);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    println!("vilij (threaded algorithm-execution demo)");
    println!("usage:");
    println!("  vilij [classify|cluster] [options]");
    println!("options:");
    println!("  --file PATH       tab-separated data (@name<TAB>label<TAB>x,y)");
    println!("  --iterations N    maximum iterations (default 100)");
    println!("  --interval N      publish every N iterations (default 5)");
    println!("  --clusters K      cluster count, clamped to 2..=4 (default 2)");
    println!("  --continuous      run without pausing between updates");
    println!("  --pacing-ms N     delay between continuous updates (default 1000)");
    println!("  --seed N          fixed random seed");
    println!("  --no-early-stop   disable the random early stop");
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut kind = AlgorithmKind::Classification;
    let mut file = None;
    let mut request = RunRequest::default();

    let mut it = args.iter();
    while let Some(arg) = it.next() {
        let mut value = |name: &str| {
            it.next()
                .ok_or_else(|| format!("missing value for {name}"))
                .cloned()
        };
        match arg.as_str() {
            "classify" => kind = AlgorithmKind::Classification,
            "cluster" => kind = AlgorithmKind::Clustering,
            "--continuous" => request = request.with_continuous(true),
            "--no-early-stop" => request = request.with_early_stop(None),
            "--file" => file = Some(PathBuf::from(value(arg)?)),
            "--iterations" => request.max_iterations = number(arg, &value(arg)?)?,
            "--interval" => request.update_interval = number(arg, &value(arg)?)?,
            "--clusters" => request = request.with_cluster_count(number(arg, &value(arg)?)?),
            "--pacing-ms" => {
                let ms: u64 = number(arg, &value(arg)?)?;
                request = request.with_pacing(Duration::from_millis(ms));
            }
            "--seed" => request = request.with_seed(number(arg, &value(arg)?)?),
            other => return Err(format!("Unknown argument: {other}")),
        }
    }
    Ok(Args {
        kind,
        file,
        request,
    })
}

fn number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, String> {
    raw.parse()
        .map_err(|_| format!("{name} expects a number, got '{raw}'"))
}

fn run(args: Args) -> Result<(), String> {
    let text = match &args.file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?,
        None => SAMPLE.to_string(),
    };

    let (ui, inbox) = ui_queue();
    let mut controller = ExecutionController::new(Dataset::new(), ui);
    let notice = |e: ControlError| {
        let (title, message) = e.notice();
        format!("{title}: {message}")
    };

    if let Some(warning) = controller.load(&text).map_err(notice)? {
        let (title, message) = warning.notice();
        warn!(%title, "{message}");
    }
    info!("{}", controller.dataset().summary(args.file.as_deref()));

    controller
        .start(&args.request, args.kind)
        .map_err(notice)?;

    let idle = idle_timeout(args.request.pacing);
    while let Some(event) = inbox.next_timeout(idle) {
        print_event(&event);
        match event {
            UiEvent::State {
                state: ExecutionState::Paused,
            } => {
                if let Err(e) = controller.advance_one_step() {
                    warn!(%e, "could not advance");
                }
            }
            UiEvent::State {
                state: ExecutionState::Done,
            } => {
                let teardown = controller.acknowledge();
                info!(?teardown, "run acknowledged");
                return Ok(());
            }
            _ => {}
        }
    }

    let teardown = controller.request_cancel();
    Err(format!("no progress for {idle:?}, cancelled ({teardown:?})"))
}

/// Longest silence tolerated before the demo gives up on a run.
fn idle_timeout(pacing: Duration) -> Duration {
    IDLE_POLL.max(pacing.saturating_mul(2))
}

fn print_event(event: &UiEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(%e, "cannot encode ui event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_timeout_outlasts_slow_pacing() {
        assert_eq!(idle_timeout(Duration::from_secs(1)), IDLE_POLL);
        assert_eq!(
            idle_timeout(Duration::from_secs(60)),
            Duration::from_secs(120)
        );
        assert_eq!(idle_timeout(Duration::MAX), Duration::MAX);
    }

    #[test]
    fn pacing_flag_reaches_the_request() {
        let args: Vec<String> = ["--continuous", "--pacing-ms", "60000"]
            .into_iter()
            .map(String::from)
            .collect();
        let parsed = parse_args(&args).unwrap();
        assert!(parsed.request.continuous);
        assert_eq!(parsed.request.pacing, Duration::from_secs(60));
        assert!(idle_timeout(parsed.request.pacing) > parsed.request.pacing);
    }
}
