//! ChromeBreaker CLI
//!
//! Command-line interface for RP6 resource pack extraction and MSH mesh
//! inspection.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use chromebreaker_core::{ExportOptions, ResourceType};
use chromebreaker_export::ResourceWriter;
use chromebreaker_parsers::logging::{init_with_config, TracingConfig};
use chromebreaker_parsers::{
    MshFile, MshParser, MshWriter, ParseOptions, Parser as ParserTrait, Rp6Archive, Rp6Parser,
};

/// ChromeBreaker - Chrome Engine resource pack extractor
#[derive(Parser)]
#[command(name = "chromebreaker")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format for listings
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {s}")),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and convert every resource of an RP6 pack
    Unpack(UnpackArgs),

    /// Summarize the index tables of an RP6 pack
    List(ListArgs),

    /// Print the node and mesh structure of an MSH file
    MshInfo(MshInfoArgs),

    /// Read an MSH file and write it back through the chunk writer
    Remux(RemuxArgs),
}

#[derive(Args)]
struct UnpackArgs {
    /// Path to the .rpack archive
    archive: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "out")]
    output: PathBuf,

    /// Dump raw parts for every resource
    #[arg(long)]
    raw: bool,

    /// Export options file (JSON); created with defaults if missing
    #[arg(long)]
    config: Option<PathBuf>,

    /// Require the archive magic to be exactly RP6L
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct ListArgs {
    /// Path to the .rpack archive
    archive: PathBuf,

    /// Only list resources whose name contains this text
    #[arg(short, long)]
    pattern: Option<String>,

    /// Only list resources of this type (e.g. Mesh, Texture)
    #[arg(short = 't', long = "type")]
    kind: Option<String>,
}

#[derive(Args)]
struct MshInfoArgs {
    /// Path to the .msh file
    path: PathBuf,
}

#[derive(Args)]
struct RemuxArgs {
    /// Source .msh file
    input: PathBuf,

    /// Destination .msh file
    output: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_with_config(TracingConfig::from_verbosity(cli.verbose));

    match cli.command {
        Commands::Unpack(args) => cmd_unpack(args),
        Commands::List(args) => cmd_list(args, cli.format),
        Commands::MshInfo(args) => cmd_msh_info(args, cli.format),
        Commands::Remux(args) => cmd_remux(args),
    }
}

/// Options from `--config`, or defaults with a warning when unreadable
fn load_export_options(path: Option<&Path>) -> ExportOptions {
    let Some(path) = path else {
        return ExportOptions::default();
    };
    match ExportOptions::load_or_create(path) {
        Ok(options) => options,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not load export options, using defaults");
            ExportOptions::default()
        }
    }
}

fn cmd_unpack(args: UnpackArgs) -> Result<()> {
    if !args.archive.exists() {
        bail!("File not found: {:?}", args.archive);
    }

    let mut options = load_export_options(args.config.as_deref());
    options.dump_raw |= args.raw;
    let parse_options = ParseOptions { strict_validation: args.strict, ..ParseOptions::default() };

    info!("Opening archive: {:?}", args.archive);
    let extraction = Rp6Parser::new()
        .extract_file(&args.archive, &parse_options)
        .with_context(|| format!("Failed to extract {}", args.archive.display()))?;

    fs::create_dir_all(&args.output).context("Failed to create output directory")?;
    let writer = ResourceWriter::new(&args.output, options);
    let manifest = writer
        .write_extraction(&extraction, Some(args.archive.as_path()))
        .context("Failed to write resources")?;

    println!("Unpack complete:");
    println!("  Resources:     {}", manifest.resources.len());
    println!("  Files:         {}", manifest.file_count());
    println!("  Raw fallbacks: {}", manifest.raw_fallback_count());
    println!("  Skipped:       {}", manifest.skipped.len());

    Ok(())
}

fn cmd_list(args: ListArgs, format: OutputFormat) -> Result<()> {
    let archive = Rp6Parser::new()
        .parse_file(&args.archive)
        .with_context(|| format!("Failed to read index of {}", args.archive.display()))?;

    let mut indices: Vec<usize> = match args.pattern {
        Some(ref pattern) => archive.find(pattern),
        None => (0..archive.resource_count()).collect(),
    };
    if let Some(ref kind) = args.kind {
        let kind = ResourceType::from_name(&format!("EResType::{kind}"));
        if kind == ResourceType::Invalid {
            bail!("Unknown resource type: {:?}", args.kind);
        }
        let matching = archive.find_by_type(kind);
        indices.retain(|index| matching.contains(index));
    }

    match format {
        OutputFormat::Json => print_list_json(&archive, &indices)?,
        OutputFormat::Text => print_list_text(&archive, &indices),
    }
    Ok(())
}

fn print_list_text(archive: &Rp6Archive, indices: &[usize]) {
    let header = &archive.header;
    println!("Version:    {}", header.version);
    println!("Sections:   {} ({} compressed)", archive.sections.len(), archive.compressed_section_count());
    println!("Physical:   {}", archive.physical.len());
    println!("Logical:    {}", archive.resource_count());
    println!("Data size:  {}", format_size(archive.total_data_size()));
    println!();

    println!("{:<6} {:<12} {:<12} {:<12} {}", "Sect", "Offset", "Size", "Packed", "Resources");
    println!("{:-<6} {:-<12} {:-<12} {:-<12} {:-<10}", "", "", "", "", "");
    for (i, section) in archive.sections.iter().enumerate() {
        println!(
            "{:<6} {:<12} {:<12} {:<12} {}",
            i,
            format!("0x{:X}", section.byte_offset()),
            format_size(u64::from(section.data_size)),
            format_size(u64::from(section.compressed_size)),
            section.resource_count
        );
    }
    println!();

    println!("{:<6} {:<24} {:<6} {}", "Index", "Type", "Parts", "Name");
    println!("{:-<6} {:-<24} {:-<6} {:-<40}", "", "", "", "");
    for &index in indices {
        let entry = &archive.logical[index];
        println!(
            "{:<6} {:<24} {:<6} {}",
            index,
            ResourceType::from_code(entry.file_type()).pretty_name(),
            entry.part_count(),
            archive.name_of(index)
        );
    }
    println!("\nTotal: {} resources", indices.len());
}

fn print_list_json(archive: &Rp6Archive, indices: &[usize]) -> Result<()> {
    let resources: Vec<_> = indices
        .iter()
        .map(|&index| {
            let entry = &archive.logical[index];
            serde_json::json!({
                "index": index,
                "name": archive.name_of(index),
                "type": ResourceType::from_code(entry.file_type()),
                "parts": entry.part_count(),
            })
        })
        .collect();

    let json = serde_json::json!({
        "header": archive.header,
        "sections": archive.sections,
        "resources": resources,
    });
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

fn read_msh(path: &Path) -> Result<MshFile> {
    MshParser::new()
        .parse_file(path)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn cmd_msh_info(args: MshInfoArgs, format: OutputFormat) -> Result<()> {
    let file = read_msh(&args.path)?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&file)?);
        return Ok(());
    }

    println!("Nodes:         {}", file.nodes.len());
    println!("Meshes:        {}", file.mesh_count());
    println!("Vertices:      {}", file.vertex_count());
    println!("Materials:     {}", file.materials.join(", "));
    println!("Surface types: {}", file.surface_types.join(", "));
    println!();

    for (i, node) in file.nodes.iter().enumerate() {
        let parent = node.parent.map_or_else(|| "-".to_string(), |p| p.to_string());
        println!(
            "[{i}] {} (parent {parent}, {:?}, {} descendants)",
            node.name, node.kind, node.descendant_count
        );
        for (lod, mesh) in node.meshes.iter().enumerate() {
            println!(
                "    lod {lod}: {} vertices, {} indices, {} surfaces, {} streams",
                mesh.vertex_count,
                mesh.indices.len(),
                mesh.surfaces.len(),
                mesh.populated_streams()
            );
        }
    }
    Ok(())
}

fn cmd_remux(args: RemuxArgs) -> Result<()> {
    let file = read_msh(&args.input)?;

    let bytes = MshWriter::new()
        .to_bytes(&file)
        .context("Failed to encode mesh")?;
    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&args.output, &bytes).with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!("Wrote {} ({})", args.output.display(), format_size(bytes.len() as u64));
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
