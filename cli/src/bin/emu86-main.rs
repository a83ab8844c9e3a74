use std::fs;
use std::io::{self, Write};
use std::process::exit;

use clap::{App, Arg};

use emu86::disasm::disassemble;
use emu86::machine::Machine;

fn main() {
    let matches = App::new("emu86")
        .version("0.1.0")
        .about("Intel 8086 emulator and disassembler")
        .arg(
            Arg::with_name("INPUT")
                .help("flat 8086 machine code image")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("disassemble")
                .short("d")
                .long("disassemble")
                .help("disassemble the image instead of executing it"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .conflicts_with("disassemble")
                .help("log registers, disassembly and cycles for every executed instruction"),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .help("write the listing or trace to FILE instead of stdout"),
        )
        .get_matches();

    let path = matches.value_of("INPUT").unwrap();
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("error reading {}: {}", path, e);
            exit(2);
        }
    };

    if matches.is_present("disassemble") {
        let listing = match disassemble(&data) {
            Ok(listing) => listing,
            Err(e) => {
                eprintln!("error decoding instructions: {}", e);
                exit(3);
            }
        };
        if let Err(e) = write_listing(matches.value_of("output"), &listing) {
            eprintln!("error writing output: {}", e);
            exit(4);
        }
        return;
    }

    let mut machine = Machine::default();
    if let Err(e) = machine.load_program(&data, true) {
        eprintln!("simulation error: {}", e);
        exit(5);
    }

    let verbose = matches.is_present("verbose");
    let mut trace: Box<dyn Write> = match matches.value_of("output") {
        Some(p) if verbose => match fs::File::create(p) {
            Ok(f) => Box::new(f),
            Err(e) => {
                eprintln!("error writing output: {}", e);
                exit(4);
            }
        },
        _ => Box::new(io::stdout()),
    };

    loop {
        let step = match machine.step() {
            Ok(step) => step,
            Err(e) => {
                eprintln!("simulation error: {}", e);
                exit(5);
            }
        };
        if verbose {
            if let Err(e) = writeln!(trace, "{}", machine.trace_line(&step)) {
                eprintln!("error writing output: {}", e);
                exit(4);
            }
        }
        if step.halted {
            break;
        }
    }
}

fn write_listing(path: Option<&str>, listing: &str) -> io::Result<()> {
    match path {
        Some(p) => fs::write(p, listing),
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            out.write_all(listing.as_bytes())?;
            out.write_all(b"\n")
        }
    }
}
