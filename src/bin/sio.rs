/// Interactive SIO drive console application

use atrsio::pia::{PBCTL, PIA_BASE};
use atrsio::*;
use log::debug;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

/// PBCTL value with the command line asserted
const COMMAND_LINE_LOW: u8 = 0x34;
/// PBCTL value with the command line released
const COMMAND_LINE_HIGH: u8 = 0x3C;

/// Command completer for the REPL
struct CommandCompleter {
    commands: Vec<&'static str>,
}

impl CommandCompleter {
    fn new() -> Self {
        Self {
            commands: vec![
                "binload", "disable", "enable", "exit", "format", "help", "info", "load",
                "mount", "percom", "quit", "read", "save", "status", "umount", "write",
            ],
        }
    }
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        // Only complete the command name
        let line_to_cursor = &line[..pos];
        if line_to_cursor.contains(' ') {
            return Ok((pos, vec![]));
        }

        let prefix = line_to_cursor.to_lowercase();
        let matches: Vec<Pair> = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(&prefix))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();

        Ok((0, matches))
    }
}

impl Hinter for CommandCompleter {
    type Hint = String;
}

impl Highlighter for CommandCompleter {}
impl Validator for CommandCompleter {}
impl Helper for CommandCompleter {}

/// Get the path to the history file
fn history_path() -> Option<std::path::PathBuf> {
    dirs::home_dir().map(|mut p| {
        p.push(".atrsio_history");
        p
    })
}

fn main() {
    env_logger::init();

    println!("=== ATR SIO ===");
    println!("Interactive console for Atari disk drives on the SIO bus.");
    println!("Type 'help' for available commands\n");

    let mut rl: Editor<CommandCompleter, DefaultHistory> = match Editor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Failed to create editor: {}", e);
            std::process::exit(1);
        }
    };
    rl.set_helper(Some(CommandCompleter::new()));

    if let Some(history_path) = history_path() {
        let _ = rl.load_history(&history_path);
    }

    let mut port = SioPort::new(DiskStore::new());

    loop {
        let input = match rl.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(input);

        let parts = parse_command_line(input);
        let Some(command) = parts.first().map(|c| c.to_lowercase()) else {
            continue;
        };
        let args = &parts[1..];

        match command.as_str() {
            "help" => print_help(),
            "quit" | "exit" => break,
            "mount" => {
                let (Some(unit), Some(path)) =
                    (args.first().and_then(|a| parse_unit(a)), args.get(1))
                else {
                    println!("Usage: mount <unit> <path> [ro]");
                    continue;
                };
                let read_only = args.get(2).is_some_and(|a| a.eq_ignore_ascii_case("ro"));
                match port.drives_mut().mount(unit, path, read_only) {
                    Ok(()) => {
                        let drives = port.drives();
                        println!("D{}: {} ({})", unit, drives.filename(unit), drives.status(unit));
                        if let Some(geometry) = drives.geometry(unit) {
                            println!("     {}", geometry);
                        }
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "umount" => match args.first().map(String::as_str) {
                Some("all") => {
                    port.drives_mut().dismount_all();
                    println!("All drives empty");
                }
                Some(arg) => match parse_unit(arg) {
                    Some(unit) => match port.drives_mut().dismount(unit) {
                        Ok(()) => println!("D{}: {}", unit, port.drives().filename(unit)),
                        Err(e) => println!("Error: {}", e),
                    },
                    None => println!("Usage: umount <unit|all>"),
                },
                None => println!("Usage: umount <unit|all>"),
            },
            "enable" | "disable" => {
                let Some(unit) = args.first().and_then(|a| parse_unit(a)) else {
                    println!("Usage: {} <unit>", command);
                    continue;
                };
                let result = if command == "enable" {
                    port.drives_mut().enable(unit)
                } else {
                    port.drives_mut().disable(unit)
                };
                match result {
                    Ok(()) => println!("D{}: {}", unit, port.drives().status(unit)),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "info" => print_info(port.drives()),
            "binload" => match args.first().map(|a| a.to_lowercase()).as_deref() {
                Some("on") => port.drives_mut().set_binary_loading(true),
                Some("off") => port.drives_mut().set_binary_loading(false),
                _ => println!(
                    "Binary loading is {}",
                    if port.drives().is_binary_loading() { "on" } else { "off" }
                ),
            },
            "read" => {
                let (Some(unit), Some(sector)) = (
                    args.first().and_then(|a| parse_unit(a)),
                    args.get(1).and_then(|a| parse_number(a)),
                ) else {
                    println!("Usage: read <unit> <sector>");
                    continue;
                };
                let size = port.drives().locate(unit, sector).size;
                if let Some(data) = read_frame(&mut port, unit, 0x52, sector, size) {
                    print_hex_dump(&data, size);
                }
            }
            "write" => {
                let (Some(unit), Some(sector), Some(fill)) = (
                    args.first().and_then(|a| parse_unit(a)),
                    args.get(1).and_then(|a| parse_number(a)),
                    args.get(2).and_then(|a| parse_number(a)),
                ) else {
                    println!("Usage: write <unit> <sector> <fill byte>");
                    continue;
                };
                let size = port.drives().locate(unit, sector).size;
                let data = vec![fill as u8; size];
                write_frame(&mut port, unit, 0x57, sector, &data);
            }
            "status" => {
                let Some(unit) = args.first().and_then(|a| parse_unit(a)) else {
                    println!("Usage: status <unit>");
                    continue;
                };
                if let Some(frame) = read_frame(&mut port, unit, 0x53, 0, 4) {
                    let flags = DriveStatusFlags::new(frame[0]);
                    println!("Status:     {}", flags);
                    println!("Controller: {:02X}", frame[1]);
                    println!("Timeout:    {}", frame[2]);
                }
            }
            "percom" => {
                let Some(unit) = args.first().and_then(|a| parse_unit(a)) else {
                    println!("Usage: percom <unit> [sector size] [sector count]");
                    continue;
                };
                let size = args.get(1).and_then(|a| parse_number(a));
                let count = args.get(2).and_then(|a| parse_number(a));
                if let (Some(size), Some(count)) = (size, count) {
                    write_frame(&mut port, unit, 0x4F, 0, &percom_block(size, u32::from(count)));
                }
                if let Some(block) = read_frame(&mut port, unit, 0x4E, 0, 12) {
                    print_percom(&block);
                }
            }
            "format" => {
                let Some(unit) = args.first().and_then(|a| parse_unit(a)) else {
                    println!("Usage: format <unit> [enhanced]");
                    continue;
                };
                let enhanced = args.get(1).is_some_and(|a| a.eq_ignore_ascii_case("enhanced"));
                let (code, size) = if enhanced {
                    (0x22, 128)
                } else {
                    let pending = port.drives().format_geometry(unit).unwrap_or_default();
                    (0x21, usize::from(pending.sector_size))
                };
                if read_frame(&mut port, unit, code, 0, size).is_some() {
                    if let Some(geometry) = port.drives().geometry(unit) {
                        println!("D{}: formatted, {}", unit, geometry);
                    }
                }
            }
            "save" => {
                let Some(path) = args.first() else {
                    println!("Usage: save <path>");
                    continue;
                };
                let result = File::create(path)
                    .map_err(SioError::from)
                    .and_then(|file| {
                        let mut writer = BufWriter::new(file);
                        save_state(port.drives(), &mut writer)?;
                        writer.flush()?;
                        Ok(())
                    });
                match result {
                    Ok(()) => println!("Saved drive state to {}", path),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "load" => {
                let Some(path) = args.first() else {
                    println!("Usage: load <path>");
                    continue;
                };
                let result = File::open(path)
                    .map_err(SioError::from)
                    .and_then(|file| restore_state(port.drives_mut(), &mut BufReader::new(file)));
                match result {
                    Ok(()) => print_info(port.drives()),
                    Err(e) => println!("Error: {}", e),
                }
            }
            _ => println!("Unknown command: {}. Type 'help' for available commands.", command),
        }
    }

    if let Some(history_path) = history_path() {
        let _ = rl.save_history(&history_path);
    }
    port.drives_mut().dismount_all();
    println!("Goodbye!");
}

/// Send a command frame, toggling the command line through the PIA
///
/// Returns the drive's acknowledge byte.
fn send_command(port: &mut SioPort, unit: usize, command: u8, sector: u16) -> u8 {
    let frame = CommandFrame::new(unit, command, sector);
    debug!("Sending command frame {}", frame);

    port.put_byte(PIA_BASE + PBCTL, COMMAND_LINE_LOW);
    for byte in frame.to_bytes() {
        port.serial_out(byte);
    }
    port.put_byte(PIA_BASE + PBCTL, COMMAND_LINE_HIGH);
    port.serial_in()
}

/// Run a command that returns a data frame
fn read_frame(
    port: &mut SioPort,
    unit: usize,
    command: u8,
    sector: u16,
    size: usize,
) -> Option<Vec<u8>> {
    let ack = send_command(port, unit, command, sector);
    if ack != DriveReply::Ack.byte() {
        print_reply("Command", ack);
        return None;
    }

    let reply = port.serial_in();
    let data: Vec<u8> = (0..size).map(|_| port.serial_in()).collect();
    let sum = port.serial_in();
    if sum != checksum(&data) {
        println!("Checksum mismatch: got {:02X}, expected {:02X}", sum, checksum(&data));
    }
    print_reply("Reply", reply);

    (reply == DriveReply::Complete.byte()).then_some(data)
}

/// Run a command that sends a data frame
fn write_frame(port: &mut SioPort, unit: usize, command: u8, sector: u16, data: &[u8]) {
    let ack = send_command(port, unit, command, sector);
    if ack != DriveReply::Ack.byte() {
        print_reply("Command", ack);
        return;
    }

    for &byte in data {
        port.serial_out(byte);
    }
    port.serial_out(checksum(data));

    let first = port.serial_in();
    if first == DriveReply::Ack.byte() {
        print_reply("Reply", port.serial_in());
    } else {
        print_reply("Data frame", first);
    }
}

fn print_reply(what: &str, byte: u8) {
    match DriveReply::from_byte(byte) {
        Some(reply) => println!("{}: {}", what, reply),
        None => println!("{}: unexpected {:02X}", what, byte),
    }
}

/// Parse a unit as "1", "D1" or "D1:"
fn parse_unit(s: &str) -> Option<usize> {
    let digits = s.trim_start_matches(['D', 'd']).trim_end_matches(':');
    digits.parse().ok()
}

fn parse_number(s: &str) -> Option<u16> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix('$')) {
        u16::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

/// Parse command line input, respecting quoted strings
fn parse_command_line(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

fn print_help() {
    println!("Available commands:");
    println!("  mount <unit> <path> [ro]       - Mount an image (use quotes for paths with spaces)");
    println!("  umount <unit|all>              - Remove the image from a drive");
    println!("  enable <unit>                  - Switch a drive on without a disk");
    println!("  disable <unit>                 - Switch a drive off");
    println!("  info                           - Show all drives");
    println!("  read <unit> <sector>           - Read and display a sector over the bus");
    println!("  write <unit> <sector> <byte>   - Fill a sector with a byte over the bus");
    println!("  status <unit>                  - Read the drive status frame");
    println!("  percom <unit> [size count]     - Show, or set then show, the PERCOM block");
    println!("  format <unit> [enhanced]       - Format the disk in a drive");
    println!("  binload [on|off]               - Show or set binary load mode");
    println!("  save <path>                    - Save the drive state");
    println!("  load <path>                    - Restore a saved drive state");
    println!("  help                           - Show this help");
    println!("  quit, exit                     - Exit");
}

fn print_info(drives: &DiskStore) {
    for (unit, drive) in drives.units() {
        let kind = drive.image_kind().map_or("", |k| k.name());
        println!(
            "D{}: {:<10} {:<4} {}",
            unit,
            drive.status().to_string(),
            kind,
            drive.filename()
        );
        if let Some(geometry) = drive.geometry() {
            println!("     {}", geometry);
        }
    }
}

fn print_percom(block: &[u8]) {
    if let [tracks, _, spt_hi, spt_lo, heads, density, size_hi, size_lo, ..] = *block {
        println!("Tracks:            {}", tracks);
        println!("Sectors per track: {}", u16::from_be_bytes([spt_hi, spt_lo]));
        println!("Sides:             {}", u16::from(heads) + 1);
        println!("Density:           {}", if density == 0 { "FM" } else { "MFM" });
        println!("Sector size:       {}", u16::from_be_bytes([size_hi, size_lo]));
    }
}

fn print_hex_dump(data: &[u8], max_bytes: usize) {
    let len = data.len().min(max_bytes);

    for (i, chunk) in data[..len].chunks(16).enumerate() {
        print!("{:04X}: ", i * 16);

        for (j, byte) in chunk.iter().enumerate() {
            print!("{:02X} ", byte);
            if j == 7 {
                print!(" ");
            }
        }

        // Pad if less than 16 bytes
        for j in chunk.len()..16 {
            print!("   ");
            if j == 7 {
                print!(" ");
            }
        }

        print!(" |");
        for byte in chunk {
            let c = if (32..127).contains(byte) {
                *byte as char
            } else {
                '.'
            };
            print!("{}", c);
        }
        println!("|");
    }

    if data.len() > max_bytes {
        println!("... ({} more bytes)", data.len() - max_bytes);
    }
}
