use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

const HELP: &str = "bsky-comments — Render a Bluesky post's replies as an embeddable comment section.

  --post <ref>         Post to load (at:// URI or https://bsky.app/profile/<actor>/post/<id>)
  --no-css             Leave out the default <style> block
  --more <n>           Press \"show more\" n times before printing
  --config <path>      Read configuration from <path>
  --version, -V        Show version and exit
  --help,    -h        Show this help message";

fn main() {
    init_logging();

    let options = match parse_args(std::env::args().skip(1)) {
        Ok(Some(options)) => options,
        Ok(None) => return,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };

    match bsky_comments::run(options) {
        Ok(markup) => println!("{markup}"),
        Err(err) => {
            eprintln!("error: {err:?}");
            std::process::exit(1);
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Returns `Ok(None)` when a flag was handled and the process should exit.
fn parse_args<I>(args: I) -> Result<Option<bsky_comments::RunOptions>, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = bsky_comments::RunOptions::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("bsky-comments {}", bsky_comments::VERSION);
                return Ok(None);
            }
            "--help" | "-h" => {
                println!("{HELP}");
                return Ok(None);
            }
            "--post" => {
                options.post = Some(args.next().ok_or("--post needs a value")?);
            }
            "--no-css" => options.no_css = true,
            "--more" => {
                let value = args.next().ok_or("--more needs a value")?;
                options.show_more = value
                    .parse()
                    .map_err(|_| format!("--more expects a number, got {value:?}"))?;
            }
            "--config" => {
                let value = args.next().ok_or("--config needs a value")?;
                options.config_file = Some(PathBuf::from(value));
            }
            other => return Err(format!("unknown argument {other:?}")),
        }
    }
    Ok(Some(options))
}
