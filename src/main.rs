use argh::FromArgs;
use cmdtree::Interpreter;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(FromArgs)]
/// Run commands from the built-in command registry, once or interactively.
struct Args {
    #[argh(option, default = "String::from(\"warn\")")]
    /// log filter used when RUST_LOG is not set, e.g. "debug" or "cmdtree=trace".
    log_level: String,

    #[argh(option, default = "String::from(\"> \")")]
    /// prompt shown by the interactive loop.
    prompt: String,

    #[argh(option)]
    /// file to load and save the interactive history from.
    history: Option<PathBuf>,

    #[argh(positional, greedy)]
    /// command to run once; starts the interactive loop when omitted.
    command: Vec<String>,
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();
    let env = env_logger::Env::default().default_filter_or(args.log_level.as_str());
    env_logger::Builder::from_env(env).init();

    let sh = match Interpreter::with_builtins() {
        Ok(sh) => sh,
        Err(err) => {
            eprintln!("failed to build command registry: {}", err);
            return ExitCode::FAILURE;
        }
    };

    if args.command.is_empty() {
        return match sh.repl(&args.prompt, args.history.as_deref()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("Error: {:?}", err);
                ExitCode::FAILURE
            }
        };
    }

    let tokens = sh.expand_dotted_head(args.command);
    match sh.run(tokens.as_slice()) {
        Ok(value) => {
            if !value.is_unit() {
                println!("{}", value);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}
