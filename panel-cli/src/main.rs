use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use panel_core::PanelConfig;
use panel_csv::{build_panel, write_panel_file, SourceCatalog, SourceFiles, OUTPUT_FILE};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "matched-panel",
    about = "Ghép khí máu, hemoglobin, nhiệt độ và chỉ số tim quanh các mốc cung lượng tim."
)]
struct Args {
    /// Thư mục chứa các file CSV nguồn.
    #[arg(long, default_value = "output")]
    data_dir: PathBuf,

    /// File khí máu (mặc định nằm trong data-dir).
    #[arg(long)]
    blood_gas_file: Option<PathBuf>,

    /// File hemoglobin/nhiệt độ (mặc định nằm trong data-dir).
    #[arg(long)]
    hgb_temp_file: Option<PathBuf>,

    /// File đo Swan-Ganz (mặc định nằm trong data-dir).
    #[arg(long)]
    swan_file: Option<PathBuf>,

    /// File kết quả (mặc định nằm trong data-dir).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dung sai (phút) cho khí máu động mạch/trung tâm.
    #[arg(long, default_value_t = 15.0)]
    bloodgas_window_min: f64,

    /// Dung sai (phút) cho hemoglobin.
    #[arg(long, default_value_t = 720.0)]
    hemoglobin_window_min: f64,

    /// Dung sai (phút) cho nhiệt độ.
    #[arg(long, default_value_t = 30.0)]
    temperature_window_min: f64,

    /// Dung sai (phút) cho chỉ số tim.
    #[arg(long, default_value_t = 15.0)]
    cardiac_index_window_min: f64,

    /// Nhận mẫu tĩnh mạch (VEN) thay cho mẫu trung tâm (mặc định bật).
    #[arg(long, overrides_with = "no_include_venous")]
    include_venous: bool,

    /// Bỏ mẫu tĩnh mạch.
    #[arg(long)]
    no_include_venous: bool,

    /// Ghi log chi tiết (debug).
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> PanelConfig {
        PanelConfig {
            bloodgas_window_minutes: self.bloodgas_window_min,
            hemoglobin_window_minutes: self.hemoglobin_window_min,
            temperature_window_minutes: self.temperature_window_min,
            cardiac_index_window_minutes: self.cardiac_index_window_min,
            include_venous: !self.no_include_venous,
        }
    }

    fn source_files(&self) -> SourceFiles {
        let defaults = SourceFiles::in_dir(&self.data_dir);
        SourceFiles {
            swan: self.swan_file.clone().unwrap_or(defaults.swan),
            blood_gas: self.blood_gas_file.clone().unwrap_or(defaults.blood_gas),
            hgb_temp: self.hgb_temp_file.clone().unwrap_or(defaults.hgb_temp),
        }
    }

    fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.data_dir.join(OUTPUT_FILE))
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Số dòng có dấu phẩy ngăn cách hàng nghìn (`1,234`).
fn group_thousands(count: usize) -> String {
    let digits = count.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = args.config();
    let files = args.source_files();
    tracing::debug!(?config, ?files, "starting panel build");

    let rows = build_panel(&files, &SourceCatalog::default(), &config)
        .with_context(|| format!("Không dựng được bảng từ {:?}", files.swan))?;

    let output = args.output_path();
    let written = write_panel_file(&output, &rows)
        .with_context(|| format!("Không ghi được file {:?}", output))?;

    println!(
        "Wrote {} rows to {}",
        group_thousands(written),
        output.display()
    );

    Ok(())
}
