use neurofeed::{
    build_frame, generate_with, Activation, ActivityMatrix, AreaLayout, GenerationConfig, Prng,
    SimulationConfig,
};

const SHADES: &[u8] = b" .:-=+*#%@";

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, rest) = match args.first().map(String::as_str) {
        Some("--help" | "-h" | "help") => {
            print_help();
            return;
        }
        Some("frame") => ("frame", &args[1..]),
        Some("generate") => ("generate", &args[1..]),
        _ => ("generate", &args[..]),
    };

    let opts = match Options::parse(rest) {
        Ok(opts) => opts,
        Err(msg) => {
            eprintln!("{msg}");
            print_help();
            std::process::exit(2);
        }
    };

    let mut rng = opts.seed.map(Prng::new).unwrap_or_else(Prng::from_entropy);
    let result = match command {
        "frame" => run_frame(&opts, &mut rng),
        _ => run_generate(&opts, &mut rng),
    };
    if let Err(msg) = result {
        eprintln!("{msg}");
        std::process::exit(1);
    }
}

fn run_generate(opts: &Options, rng: &mut Prng) -> Result<(), String> {
    let matrix = generate_with(&opts.generation, rng).map_err(|e| e.to_string())?;
    if opts.json {
        let json = serde_json::to_string(&matrix).map_err(|e| e.to_string())?;
        println!("{json}");
    } else {
        print_heatmap(&matrix);
        println!(
            "{}x{} active={} total={:.3}",
            matrix.row_count(),
            matrix.column_count(),
            matrix.active_count(),
            matrix.total()
        );
    }
    Ok(())
}

fn run_frame(opts: &Options, rng: &mut Prng) -> Result<(), String> {
    let config = SimulationConfig {
        rows: opts.generation.rows,
        columns: opts.generation.columns,
        activation: opts.generation.activation,
        silent: opts.generation.silent,
        ..SimulationConfig::default()
    };
    let frame = build_frame(&AreaLayout::default(), &config, 1, rng).map_err(|e| e.to_string())?;
    if opts.json {
        let json = serde_json::to_string_pretty(&frame).map_err(|e| e.to_string())?;
        println!("{json}");
        return Ok(());
    }
    for (name, matrix) in &frame.areas {
        println!("── {name} (active={})", matrix.active_count());
        print_heatmap(matrix);
    }
    println!(
        "totalActivity={:.3} globalInhibition={:.5}",
        frame.total_activity, frame.global_inhibition
    );
    Ok(())
}

fn print_heatmap(matrix: &ActivityMatrix) {
    for row in matrix.rows() {
        let line: String = row
            .iter()
            .map(|v| {
                let idx = ((v.clamp(0.0, 1.0)) * (SHADES.len() - 1) as f32).round() as usize;
                SHADES[idx] as char
            })
            .collect();
        println!("{line}");
    }
}

struct Options {
    generation: GenerationConfig,
    seed: Option<u64>,
    json: bool,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut generation = GenerationConfig::default();
        let mut seed = None;
        let mut json = false;

        let mut it = args.iter();
        while let Some(flag) = it.next() {
            match flag.as_str() {
                "--silent" => generation.silent = true,
                "--json" => json = true,
                "--rows" => generation.rows = value(flag, it.next())?,
                "--columns" | "--cols" => generation.columns = value(flag, it.next())?,
                "--count" => generation.activation = Activation::Count(value(flag, it.next())?),
                "--fraction" => {
                    generation.activation = Activation::Fraction(value(flag, it.next())?)
                }
                "--seed" => seed = Some(value(flag, it.next())?),
                other => return Err(format!("Unknown argument: {other}")),
            }
        }

        Ok(Self {
            generation,
            seed,
            json,
        })
    }
}

fn value<T: std::str::FromStr>(flag: &str, raw: Option<&String>) -> Result<T, String> {
    let raw = raw.ok_or_else(|| format!("{flag} needs a value"))?;
    raw.parse()
        .map_err(|_| format!("Invalid value for {flag}: {raw}"))
}

fn print_help() {
    println!("neurofeed - pseudo-random activity matrices");
    println!();
    println!("Usage:");
    println!("  neurofeed [generate] [options]   Print one matrix");
    println!("  neurofeed frame [options]        Print one frame of every area");
    println!();
    println!("Options:");
    println!("  --rows N         Matrix rows (default 25)");
    println!("  --columns N      Matrix columns (default 25)");
    println!("  --count N        Exactly N active cells");
    println!("  --fraction F     round(F * cells) active cells");
    println!("  --silent         All-zero output");
    println!("  --seed S         Reproducible output");
    println!("  --json           JSON instead of an ASCII heatmap");
}
