// Copyright (c) 2023 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

// the Justina script runner: a desktop REPL around the interpreter.
//
// to start an interactive session:
// - `$ jsr`
//
// to load a script file first (and call its main() when it has one):
// - `$ jsr /path/to/script.jus`
// - `$ jsr /path/to/script.jus --quit-after`

use std::fs::File;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::exit;
use std::time::Instant;

use clap::Parser;
use memmap2::Mmap;

use justina_runtime::{Host, HostFlags, Outcome, Session};

#[derive(Parser)]
#[command(name = "jsr", about = "Justina interpreter script runner")]
struct Cli {
    /// script file to load into the program area before the prompt opens
    script: Option<PathBuf>,

    /// leave immediately after running the script's main()
    #[arg(long)]
    quit_after: bool,
}

struct StdHost {
    started: Instant,
    rng_state: u32,
}

impl StdHost {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            rng_state: 0x2545_F491,
        }
    }
}

impl Host for StdHost {
    fn print(&mut self, text: &str) {
        print!("{}", text);
        std::io::stdout().flush().ok();
    }

    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_owned()),
        }
    }

    fn key_pressed(&mut self) -> bool {
        // a desktop console has no raw key polling; a line break counts
        self.read_line().is_some()
    }

    fn millis(&mut self) -> u32 {
        self.started.elapsed().as_millis() as u32
    }

    fn micros(&mut self) -> u32 {
        self.started.elapsed().as_micros() as u32
    }

    fn delay_slice(&mut self) {
        std::thread::sleep(std::time::Duration::from_millis(1));
    }

    fn random(&mut self, low: i32, high: i32) -> i32 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng_state = x;
        if high <= low {
            return low;
        }
        low + (x % (high - low) as u32) as i32
    }

    fn housekeeping(&mut self, _flags: &mut HostFlags) {}

    fn callback(&mut self, name: &str, _args: &mut [justina_runtime::CallbackValue]) -> bool {
        eprintln!("(no host callback registered for '{}')", name);
        false
    }
}

fn main() {
    let cli = Cli::parse();
    let mut session = Session::new(StdHost::new());

    if let Some(path) = &cli.script {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                eprintln!("cannot open {}: {}", path.display(), err);
                exit(1);
            }
        };
        let mapping = match unsafe { Mmap::map(&file) } {
            Ok(mapping) => mapping,
            Err(err) => {
                eprintln!("cannot map {}: {}", path.display(), err);
                exit(1);
            }
        };
        let text = match std::str::from_utf8(&mapping) {
            Ok(text) => text,
            Err(_) => {
                eprintln!("{} is not a text file", path.display());
                exit(1);
            }
        };

        if session.load_program(text).is_err() {
            exit(1);
        }
        if session.machine.find_function("main").is_some() {
            match session.process_line("main();") {
                Outcome::Quit => return,
                Outcome::Killed => return,
                _ => {}
            }
        }
        if cli.quit_after {
            session.reset();
            return;
        }
    }

    // the prompt
    loop {
        let prompt = if session.engine.is_stopped() {
            "Justina[dbg]> "
        } else {
            "Justina> "
        };
        print!("{}", prompt);
        std::io::stdout().flush().ok();

        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line = if line.ends_with(';') {
            line.to_owned()
        } else {
            format!("{};", line)
        };

        match session.process_line(&line) {
            Outcome::Quit => break,
            Outcome::Killed => break,
            _ => {}
        }
    }

    session.reset();
}
