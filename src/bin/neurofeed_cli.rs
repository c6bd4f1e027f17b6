//! CLI client for the `neurofeedd` daemon.
//!
//! Examples:
//!   neurofeed-cli status
//!   neurofeed-cli watch 10 --ms 250
//!   neurofeed-cli set hasSensoryInput false
//!   neurofeed-cli start 500
//!   neurofeed-cli stop
//!
//! By default it talks to 127.0.0.1:5000; override with `--addr host:port`.
//! `start`/`stop`/`set` only outlive the connection when the daemon runs in
//! broadcast mode.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::process;
use std::time::Duration;

use neurofeed::ActivityFrame;

#[derive(Debug, Serialize)]
struct Outgoing<'a> {
    event: &'a str,
    #[serde(skip_serializing_if = "Value::is_null")]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct Incoming {
    event: String,
    #[serde(default)]
    payload: Value,
}

fn usage() -> ! {
    eprintln!("neurofeed-cli (talks to neurofeedd @ 127.0.0.1:5000 by default)");
    eprintln!("Usage: neurofeed-cli [--addr host:port] <command> [args]\n");
    eprintln!("Commands:");
    eprintln!("  status                      Show feed state");
    eprintln!("  start [ms]                  Start or restart the feed");
    eprintln!("  stop                        Stop the feed");
    eprintln!("  set <key> <value>           Update one simulation parameter");
    eprintln!("  watch [n] [--ms ms]         Start the feed and print n frames (0 = forever)");
    process::exit(1);
}

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }

    let mut addr = "127.0.0.1:5000".to_string();
    if args.len() >= 2 && args[0] == "--addr" {
        addr = args[1].clone();
        args.drain(0..2);
    }

    if args.is_empty() {
        usage();
    }

    (addr, args)
}

struct Connection {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl Connection {
    fn open(addr: &str, read_timeout: Option<Duration>) -> Result<Self, String> {
        let stream = TcpStream::connect(addr).map_err(|e| format!("connect: {e}"))?;
        stream
            .set_read_timeout(read_timeout)
            .map_err(|e| format!("set_read_timeout: {e}"))?;
        let reader = BufReader::new(stream.try_clone().map_err(|e| format!("clone: {e}"))?);
        Ok(Self { stream, reader })
    }

    fn send(&mut self, event: &str, payload: Value) -> Result<(), String> {
        let line = serde_json::to_string(&Outgoing { event, payload })
            .map_err(|e| format!("serialize: {e}"))?;
        self.stream
            .write_all(line.as_bytes())
            .and_then(|_| self.stream.write_all(b"\n"))
            .map_err(|e| format!("send: {e}"))
    }

    fn recv(&mut self) -> Result<Incoming, String> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .map_err(|e| format!("recv: {e}"))?;
        if n == 0 {
            return Err("connection closed by daemon".to_string());
        }
        serde_json::from_str(&line).map_err(|e| format!("parse event: {e}"))
    }

    /// Next event that is a reply rather than a lifecycle or frame push.
    fn reply(&mut self) -> Result<Incoming, String> {
        loop {
            let ev = self.recv()?;
            match ev.event.as_str() {
                "connect" | "new-activity" => continue,
                "disconnect" => return Err(format!("refused: {}", message(&ev.payload))),
                _ => return Ok(ev),
            }
        }
    }
}

fn message(payload: &Value) -> String {
    payload
        .get("msg")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn print_reply(ev: &Incoming) {
    match ev.event.as_str() {
        "status" => println!(
            "running={} step={} stepDuration={}ms config={}",
            ev.payload["running"], ev.payload["step"], ev.payload["stepDuration"], ev.payload["config"]
        ),
        "error-notification" => eprintln!("error: {}", message(&ev.payload)),
        _ => println!("{}: {}", ev.event, message(&ev.payload)),
    }
}

fn print_frame(frame: &ActivityFrame) {
    let areas: Vec<String> = frame
        .areas
        .iter()
        .map(|(name, m)| format!("{name}={}", m.active_count()))
        .collect();
    println!(
        "step={:<6} total={:>8.3} inhibition={:.5} active[{}]",
        frame.step,
        frame.total_activity,
        frame.global_inhibition,
        areas.join(" ")
    );
}

fn watch(addr: &str, args: &[String]) -> Result<(), String> {
    let mut count: u64 = 0;
    let mut step_ms: Option<u64> = None;
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        if arg == "--ms" {
            let raw = it.next().ok_or("--ms needs a value")?;
            step_ms = Some(raw.parse().map_err(|_| format!("invalid --ms: {raw}"))?);
        } else {
            count = arg.parse().map_err(|_| format!("invalid frame count: {arg}"))?;
        }
    }

    let mut conn = Connection::open(addr, None)?;
    let payload = step_ms.map_or(Value::Null, |ms| json!({ "stepDuration": ms }));
    conn.send("start-simulation", payload)?;

    let mut seen = 0u64;
    while count == 0 || seen < count {
        let ev = conn.recv()?;
        match ev.event.as_str() {
            "new-activity" => {
                let frame: ActivityFrame = serde_json::from_value(ev.payload)
                    .map_err(|e| format!("parse frame: {e}"))?;
                print_frame(&frame);
                seen += 1;
            }
            "connect" => {}
            "disconnect" => return Err(format!("refused: {}", message(&ev.payload))),
            _ => print_reply(&ev),
        }
    }

    conn.send("stop-simulation", Value::Null)
}

fn main() {
    let (addr, args) = parse_args();
    let cmd = args[0].as_str();

    if cmd == "watch" {
        if let Err(e) = watch(&addr, &args[1..]) {
            eprintln!("{e}");
            process::exit(1);
        }
        return;
    }

    let (event, payload) = match cmd {
        "status" => ("get-status", Value::Null),
        "stop" => ("stop-simulation", Value::Null),
        "start" => match args.get(1) {
            None => ("start-simulation", Value::Null),
            Some(ms) => match ms.parse::<u64>() {
                Ok(ms) => ("start-simulation", json!({ "stepDuration": ms })),
                Err(_) => usage(),
            },
        },
        "set" => {
            if args.len() < 3 {
                usage();
            }
            let value = serde_json::from_str(&args[2]).unwrap_or_else(|_| json!(args[2]));
            ("update-config", json!({ "key": args[1], "value": value }))
        }
        _ => usage(),
    };

    let result = Connection::open(&addr, Some(Duration::from_secs(5))).and_then(|mut conn| {
        conn.send(event, payload)?;
        conn.reply()
    });

    match result {
        Ok(ev) => {
            let failed = ev.event == "error-notification";
            print_reply(&ev);
            if failed {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}
