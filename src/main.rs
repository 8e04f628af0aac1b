use reels_feed::RunOptions;

fn main() {
    let opts = match handle_cli_flags() {
        Ok(Some(opts)) => opts,
        Ok(None) => return,
        Err(message) => {
            eprintln!("error: {message}");
            std::process::exit(2);
        }
    };

    if let Err(err) = reels_feed::run(opts) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

/// Returns `Ok(None)` when a flag was handled and the program should exit.
fn handle_cli_flags() -> Result<Option<RunOptions>, String> {
    let mut opts = RunOptions::default();
    let mut saw_flag = false;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("Reels {}", reels_feed::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!(
                    "Reels - Scroll a short-video feed from the terminal.\n\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message\n  --video <id>         Open the feed at a specific video"
                );
                saw_flag = true;
            }
            "--video" => match args.next() {
                Some(id) if !id.trim().is_empty() => opts.pinned_video = Some(id.trim().to_string()),
                _ => return Err("--video requires a video id".to_string()),
            },
            other => {
                if let Some(id) = other.strip_prefix("--video=") {
                    if id.trim().is_empty() {
                        return Err("--video requires a video id".to_string());
                    }
                    opts.pinned_video = Some(id.trim().to_string());
                }
            }
        }
    }
    if saw_flag {
        Ok(None)
    } else {
        Ok(Some(opts))
    }
}
