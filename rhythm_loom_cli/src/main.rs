// CLI entry point for Rhythm Loom.
//
// `loom` hosts the engine the way an interactive front end would: it spawns
// the background worker, sends one start request, and consumes the event
// stream as it arrives. Accepted records can be persisted as a framed event
// stream (`--out`) and fed back in as an agglutination pool (`--input`).
//
// Usage:
//   loom generate    [FILTERS] [--out FILE] [--json | --quiet]
//   loom agglutinate --input FILE... [FILTERS] [--out FILE] [--json | --quiet]
//   loom inspect     DIGITS [FILTERS]
//   loom relations   --input FILE... --id ID
//
// FILTERS start from `--config FILE` or `--preset NAME` (the default
// settings otherwise) and apply flag overrides on top. Predicate flags only
// ever switch a filter on. Logging goes to stderr through `tracing`
// (`RUST_LOG`, default `info`); results go to stdout.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rhythm_loom_engine::bits::{bits_per_beat, digits_to_onsets, group_digits};
use rhythm_loom_engine::contour::contour_symbols;
use rhythm_loom_engine::predicates::{
    has_no_gaps, has_odd_intervals_oddity, has_ordinal, has_rop23, interval_entropy,
    interval_vector, is_maximally_even, low_entropy_bound, no_antipodal_pairs, relatively_flat,
};
use rhythm_loom_engine::relations::compute_relations;
use rhythm_loom_engine::syncopation::compute_syncopation;
use rhythm_loom_engine::{
    Catalog, FilterPipeline, WorkerHandle, canonical_contour, is_shadow_isomorphic,
    shadow_contour, spawn_worker,
};
use rhythm_loom_protocol::{
    FilterConfig, OddityType, Radix, RhythmRecord, StartPayload, WorkerEvent, write_event,
};

/// Minimum spacing between progress log lines.
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "loom")]
#[command(about = "Enumerate, classify and agglutinate cyclic binary rhythms")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enumerate every digit string of one shape and keep those passing the filters
    Generate {
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Concatenate every ordered pair of a pool that shares a meter
    Agglutinate {
        /// Framed event streams to load the pool from
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Analyze one grouped-digit string
    Inspect {
        /// Digits, optionally grouped with spaces (e.g. "A5 0F")
        digits: String,
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// List records of a pool that are subsets, supersets or overlaps of one record
    Relations {
        /// Framed event streams to load the pool from
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        /// Id of the selected record
        #[arg(long)]
        id: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    Default,
    Exhaustive,
    Euclidean,
    AfricanOddity,
}

impl Preset {
    fn config(self) -> FilterConfig {
        match self {
            Preset::Default => FilterConfig::default(),
            Preset::Exhaustive => FilterConfig::exhaustive(),
            Preset::Euclidean => FilterConfig::euclidean(),
            Preset::AfricanOddity => FilterConfig::african_oddity(),
        }
    }
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// JSON filter configuration; missing keys take their defaults
    #[arg(long, value_name = "FILE", conflicts_with = "preset")]
    config: Option<PathBuf>,
    #[arg(long, value_enum)]
    preset: Option<Preset>,
    /// binary, octal or hex
    #[arg(long)]
    radix: Option<Radix>,
    /// Beats per measure
    #[arg(long)]
    numerator: Option<u32>,
    /// Digits per beat
    #[arg(long)]
    denominator: Option<u32>,
    /// Stop after this many accepted rhythms (0 = unlimited)
    #[arg(long)]
    max_accepted: Option<u64>,
    #[arg(long)]
    min_onsets: Option<usize>,
    #[arg(long)]
    max_onsets: Option<usize>,
    /// Build contours without wrapping around the cycle
    #[arg(long)]
    linear: bool,
    #[arg(long)]
    no_rotation: bool,
    #[arg(long)]
    no_reflection: bool,
    /// Keep the all-rest and all-onset patterns
    #[arg(long)]
    include_trivial: bool,
    /// Require (true) or ignore (false) shadow-contour isomorphism
    #[arg(long, value_name = "BOOL")]
    isomorphic: Option<bool>,
    #[arg(long)]
    maximally_even: bool,
    /// off, rop23, odd-intervals or no-antipodes
    #[arg(long)]
    oddity: Option<OddityType>,
    #[arg(long)]
    low_entropy: bool,
    #[arg(long)]
    no_gaps: bool,
    #[arg(long)]
    flat: bool,
    /// Require an ordinal block structure of length N
    #[arg(long, value_name = "N")]
    ordinal: Option<usize>,
}

impl FilterArgs {
    /// The base configuration with every override applied, validated.
    fn resolve(&self) -> Result<FilterConfig> {
        let mut config = match (&self.config, self.preset) {
            (Some(path), _) => FilterConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            (None, Some(preset)) => preset.config(),
            (None, None) => FilterConfig::default(),
        };

        if let Some(radix) = self.radix {
            config.radix = radix;
        }
        if let Some(n) = self.numerator {
            config.numerator = n;
        }
        if let Some(d) = self.denominator {
            config.denominator = d;
        }
        if let Some(max) = self.max_accepted {
            config.max_accepted = max;
        }
        if let Some(min) = self.min_onsets {
            config.min_onsets = min;
        }
        if let Some(max) = self.max_onsets {
            config.max_onsets = max;
        }
        if let Some(isomorphic) = self.isomorphic {
            config.only_isomorphic = isomorphic;
        }
        if let Some(oddity) = self.oddity {
            config.oddity_type = oddity;
        }
        if let Some(n) = self.ordinal {
            config.ordinal_enabled = true;
            config.ordinal_n = n;
        }
        config.circular &= !self.linear;
        config.rotation_invariant &= !self.no_rotation;
        config.reflection_invariant &= !self.no_reflection;
        config.exclude_trivial &= !self.include_trivial;
        config.only_maximally_even |= self.maximally_even;
        config.only_low_entropy |= self.low_entropy;
        config.only_has_no_gaps |= self.no_gaps;
        config.only_relatively_flat |= self.flat;

        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Persist the run's event stream (length-prefixed JSON frames)
    #[arg(short, long, value_name = "FILE")]
    out: Option<PathBuf>,
    /// Print records as JSON lines instead of a table
    #[arg(long, conflicts_with = "quiet")]
    json: bool,
    /// Print nothing but the summary
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Generate { filters, output } => {
            let config = filters.resolve()?;
            run_producer(StartPayload::Generate { filters: config }, &output)
        }
        Command::Agglutinate {
            input,
            filters,
            output,
        } => {
            let config = filters.resolve()?;
            let pool = load_pool(&input)?;
            if pool.is_empty() {
                bail!("the input streams hold no records");
            }
            run_producer(
                StartPayload::Agglutinate {
                    items: pool.records().to_vec(),
                    filters: config,
                },
                &output,
            )
        }
        Command::Inspect { digits, filters } => inspect(&digits, &filters.resolve()?),
        Command::Relations { input, id } => relations(&input, &id),
    }
}

/// Run one payload on a fresh worker and report its records.
fn run_producer(payload: StartPayload, output: &OutputArgs) -> Result<()> {
    let worker = spawn_worker()?;
    worker.start(payload)?;

    let mut writer = match &output.out {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => None,
    };
    let mut results = Catalog::new();
    let started = Instant::now();
    drain_with_progress(&worker, &mut results, writer.as_mut())?;
    if let Some(mut writer) = writer {
        writer.flush()?;
    }
    worker.shutdown()?;

    if !output.quiet {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for record in results.iter() {
            if output.json {
                serde_json::to_writer(&mut out, record)?;
                writeln!(out)?;
            } else {
                print_record(&mut out, record)?;
            }
        }
    }
    info!(
        records = results.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "run complete"
    );
    Ok(())
}

/// Drain one run into `catalog`, logging progress at most once per
/// `PROGRESS_LOG_INTERVAL` and copying every event to `writer` if given.
fn drain_with_progress(
    worker: &WorkerHandle,
    catalog: &mut Catalog,
    mut writer: Option<&mut BufWriter<File>>,
) -> Result<usize> {
    let mut last_log = Instant::now();
    let added = worker.drain_run_with(catalog, |event| {
        match event {
            WorkerEvent::Meta { total_pairs } => info!(total_pairs, "agglutinating"),
            WorkerEvent::Progress { processed, emitted } => {
                if last_log.elapsed() >= PROGRESS_LOG_INTERVAL {
                    info!(processed, emitted, "progress");
                    last_log = Instant::now();
                }
            }
            WorkerEvent::Batch { .. } | WorkerEvent::Done => {}
        }
        match writer.as_mut() {
            Some(w) => write_event(w, event),
            None => Ok(()),
        }
    })?;
    Ok(added)
}

fn load_pool(paths: &[PathBuf]) -> Result<Catalog> {
    let mut pool = Catalog::new();
    for path in paths {
        let added = load_stream(&mut pool, path)?;
        info!(path = %path.display(), added, "loaded stream");
    }
    Ok(pool)
}

fn load_stream(pool: &mut Catalog, path: &Path) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let added = pool
        .ingest_stream(&mut BufReader::new(file))
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(added)
}

fn print_record(out: &mut impl Write, record: &RhythmRecord) -> std::io::Result<()> {
    let meter = record
        .meter()
        .map_or_else(|| "-".to_string(), |m| m.to_string());
    writeln!(
        out,
        "{:<32} {:>3} {:>6}  {}",
        record.grouped_digits_string, record.onset_count, meter, record.canonical_contour
    )
}

/// Parse grouped digits strictly: every non-space character must be a digit
/// of `radix`.
fn parse_digits(text: &str, radix: Radix) -> Result<Vec<u8>> {
    let mut digits = Vec::new();
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        let Some(d) = c.to_digit(u32::from(radix.base())) else {
            bail!("'{c}' is not a {radix} digit");
        };
        digits.push(d as u8);
    }
    if digits.is_empty() {
        bail!("no digits given");
    }
    Ok(digits)
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

fn inspect(text: &str, config: &FilterConfig) -> Result<()> {
    let radix = config.radix;
    let digits = parse_digits(text, radix)?;
    let (onsets, len) = digits_to_onsets(&digits, radix);
    let opts = config.contour_options();
    let meter = config.meter();

    println!(
        "rhythm      {} ({radix}, {meter})",
        group_digits(&digits, radix, meter.denominator as usize)
    );
    println!("steps       {len}");
    println!("onsets      {onsets:?}");
    println!("contour     {}", contour_symbols(&onsets, len, opts.circular));
    println!("canonical   {}", canonical_contour(&onsets, len, opts));
    println!("shadow      {}", shadow_contour(&onsets, len, opts));
    println!("isomorphic  {}", yes_no(is_shadow_isomorphic(&onsets, len, opts)));
    println!("max-even    {}", yes_no(is_maximally_even(&onsets, len)));
    println!("rop23       {}", yes_no(has_rop23(&onsets, len)));
    println!("odd-ivals   {}", yes_no(has_odd_intervals_oddity(&onsets, len)));
    println!("antipodes   {}", yes_no(!no_antipodal_pairs(&onsets, len)));
    println!(
        "entropy     {:.4} (low below {:.4})",
        interval_entropy(&onsets, len),
        low_entropy_bound(len)
    );
    println!("ivec        {:?}", interval_vector(&onsets, len));
    println!("no-gaps     {}", yes_no(has_no_gaps(&onsets, len)));
    println!("flat        {}", yes_no(relatively_flat(&onsets, len)));
    if config.ordinal_n >= 2 {
        println!(
            "ordinal({})  {}",
            config.ordinal_n,
            yes_no(has_ordinal(&onsets, len, config.ordinal_n))
        );
    }

    let spb = bits_per_beat(radix, meter.denominator as usize);
    let sync = compute_syncopation(&onsets, len, meter.numerator as usize, spb);
    println!(
        "syncopation lhl {} / offbeat {} / on {} off {} / mean weight {:.2} (max {})",
        sync.lhl_approx,
        sync.offbeat_weighted,
        sync.on_beat_count,
        sync.off_beat_count,
        sync.mean_onset_weight,
        sync.max_weight
    );

    let mut pipeline = FilterPipeline::new(config);
    match pipeline.first_rejection(&onsets, len) {
        None => println!("filters     accepted"),
        Some(stage) => println!("filters     rejected at {}", stage.name()),
    }
    Ok(())
}

fn relations(input: &[PathBuf], id: &str) -> Result<()> {
    let pool = load_pool(input)?;
    let Some(selected) = pool.get(id) else {
        bail!("no record with id '{id}' in the input streams");
    };
    let related = compute_relations(selected, pool.records());
    let sections = [
        ("subsets", &related.subsets),
        ("supersets", &related.supersets),
        ("overlaps", &related.overlaps),
    ];
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (title, records) in sections {
        writeln!(out, "{title} ({})", records.len())?;
        for record in records.iter() {
            write!(out, "  ")?;
            print_record(&mut out, record)?;
        }
    }
    Ok(())
}
