use clap::{Parser, ValueEnum};
use std::error::Error;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Instant;
use std::{process, thread};
use tms::{
    encode, parse_offset, Config, ProgramLoader, ProgramManager, TuringControl, TuringMachine,
    DEFAULT_BLANK_SYMBOL, INPUT_BLANK_SYMBOL,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Runs a single-tape Turing machine program.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(after_help = "EXAMPLES:
  tms-cli increment.tm --tape 1011
  tms-cli --demo \"Busy beaver\" --mode run --delay 200
  cat addition.tm | tms-cli --tape 111+11 --export")]
struct Cli {
    /// Path to a program file (.tm).
    /// If not provided, the program is read from stdin or the first demo is used.
    program_file: Option<PathBuf>,

    /// Run a built-in demo program, by name or index.
    #[clap(long, conflicts_with = "program_file")]
    demo: Option<String>,

    /// List the built-in demo programs and exit.
    #[clap(long)]
    list: bool,

    /// The initial tape content. `_` marks a blank cell.
    #[clap(short, long)]
    tape: Option<String>,

    /// Position of the first initial tape symbol.
    #[clap(short, long, allow_hyphen_values = true)]
    offset: Option<String>,

    /// How to execute the program.
    #[clap(short, long, value_enum, default_value_t = Mode::Compute)]
    mode: Mode,

    /// Pause between two steps in run mode, in milliseconds.
    #[clap(long)]
    delay: Option<u64>,

    /// Time budget in compute mode, in milliseconds.
    #[clap(long)]
    timeout: Option<u64>,

    /// Path to a JSON configuration file.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Print the final machine state as JSON.
    #[clap(long)]
    export: bool,

    /// Log engine activity to stderr.
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Print every step.
    Step,
    /// Run continuously, one step per delay.
    Run,
    /// Fast-forward to the end.
    Compute,
}

/// A program together with the tape it runs on.
struct Input {
    source: String,
    tape: String,
    offset: i64,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .init();
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    if cli.list {
        for (index, name) in ProgramManager::list_program_names().iter().enumerate() {
            println!("{}: {}", index, name);
        }
        return Ok(());
    }

    let config = load_config(cli)?;
    let input = load_input(cli)?;

    let mut control = TuringControl::with_config(config);
    let events = control.events();
    events.on_halt_state(|| println!("Machine halted."));
    events.on_runtime_error(|e| println!("Machine error: {}", e));
    events.on_skip_timeout(|| println!("Computation timed out."));
    events.on_skip_interrupt(|| println!("Computation interrupted."));

    control.init(&input.source, &input.tape, input.offset)?;

    match cli.mode {
        Mode::Step => {
            print_state(&control);
            while !control.is_halted() {
                control.step()?;
                print_state(&control);
            }
        }
        Mode::Run => {
            control.start()?;
            print_state(&control);
            while control.is_running() {
                if let Some(at) = control.next_step_at() {
                    thread::sleep(at.saturating_duration_since(Instant::now()));
                }
                control.poll();
                print_state(&control);
            }
        }
        Mode::Compute => {
            control.compute(None)?;
            control.wait();
        }
    }

    if let Some(machine) = control.machine() {
        println!("\nFinal tape:");
        println!("{}", render_tape(machine));
        println!(
            "Transitions: {}, Symbols: {}, State: {}, Head: {}",
            machine.transitions(),
            machine.symbols(),
            machine.state(),
            machine.position()
        );
    }

    if cli.export {
        println!("{}", encode(&control.export()?)?);
    }

    Ok(())
}

/// Builds the engine configuration: file first, then command-line overrides.
fn load_config(cli: &Cli) -> Result<Config, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(delay) = cli.delay {
        config.delay_ms = delay;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_ms = timeout;
    }

    debug!(?config, "configuration loaded");
    Ok(config)
}

/// Loads the program from a file, a demo, or stdin, in that order.
///
/// Falls back to the first demo when nothing is given.
fn load_input(cli: &Cli) -> Result<Input, Box<dyn Error>> {
    let mut input = if let Some(path) = &cli.program_file {
        Input {
            source: ProgramLoader::load_source(path)?,
            tape: String::new(),
            offset: 0,
        }
    } else if let Some(name) = &cli.demo {
        let demo = match name.parse::<usize>() {
            Ok(index) => ProgramManager::get_program_by_index(index)?,
            Err(_) => ProgramManager::get_program_by_name(name)?,
        };
        Input {
            source: demo.source.to_string(),
            tape: demo.initial_tape.clone(),
            offset: demo.offset,
        }
    } else if atty::isnt(atty::Stream::Stdin) {
        let mut source = String::new();
        io::stdin()
            .read_to_string(&mut source)
            .map_err(|e| format!("Failed to read from stdin: {}", e))?;
        Input {
            source,
            tape: String::new(),
            offset: 0,
        }
    } else {
        let demo = ProgramManager::get_program_by_index(0)?;
        println!("No program given, running demo '{}'.", demo.name);
        Input {
            source: demo.source.to_string(),
            tape: demo.initial_tape.clone(),
            offset: demo.offset,
        }
    };

    if let Some(tape) = &cli.tape {
        input.tape = tape.clone();
    }
    if let Some(offset) = &cli.offset {
        input.offset = parse_offset(offset)?;
    }

    Ok(input)
}

fn print_state(control: &TuringControl) {
    if let Some(machine) = control.machine() {
        println!(
            "Step: {}, State: {}, Head: {}, Tape: [{}]",
            machine.transitions(),
            machine.state(),
            machine.position(),
            render_tape(machine)
        );
    }
}

/// Renders the written part of the tape, widened to include the head.
fn render_tape(machine: &TuringMachine) -> String {
    let position = machine.position();
    let (start, end) = machine
        .tape()
        .bounds()
        .map_or((position, position), |(start, end)| {
            (start.min(position), end.max(position))
        });

    machine
        .tape()
        .window(start, end)
        .chars()
        .map(|c| if c == DEFAULT_BLANK_SYMBOL { INPUT_BLANK_SYMBOL } else { c })
        .collect()
}
