//! Terminal output: progress bars and colored status lines.

use aidj_client::upload::{StoredFile, UploadProgress};
use aidj_client::ConnectionState;
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

/// How a followed job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Complete { mix_url: String },
    Failed { message: String },
    Cancelled,
}

/// Live view of one job: a percentage bar with stage and log lines
/// printed above it.
///
/// Cheap to clone; clones drive the same bar.
#[derive(Clone)]
pub struct JobProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl JobProgress {
    pub fn start(job_id: &str) -> Self {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        pb.set_message(format!("Connecting to job {job_id}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    pub fn connection(&self, state: ConnectionState) {
        match state {
            ConnectionState::Open => self.pb.set_message("Connected"),
            ConnectionState::Reconnecting => {
                self.pb.println(format!(
                    "  {} Connection lost, reconnecting",
                    self.yellow.apply_to("↻")
                ));
                self.pb.set_message("Reconnecting");
            }
            ConnectionState::Connecting | ConnectionState::Closed | ConnectionState::Disposed => {}
        }
    }

    pub fn stage(&self, stage: i64, name: &str, status: &str) {
        self.pb.println(format!(
            "  {} Stage {stage} {name}: {status}",
            self.dim.apply_to("•")
        ));
        self.pb.set_message(name.to_string());
    }

    pub fn log(&self, message: &str, level: &str) {
        let style = match level {
            "error" => &self.red,
            "warning" | "warn" => &self.yellow,
            _ => &self.dim,
        };
        self.pb.println(format!("  {}", style.apply_to(message)));
    }

    /// Values outside 0..=100 are clamped for display.
    pub fn progress(&self, percent: f64) {
        self.pb.set_position(percent.clamp(0.0, 100.0).round() as u64);
    }

    pub fn notice(&self, message: &str) {
        self.pb.println(format!("  {} {message}", self.yellow.apply_to("!")));
    }

    pub fn finish(&self, outcome: &Outcome) {
        self.pb.finish_and_clear();
        match outcome {
            Outcome::Complete { mix_url } => {
                println!("  {} Mix ready: {mix_url}", self.green.apply_to("✓"));
            }
            Outcome::Failed { message } => {
                println!("  {} Job failed: {message}", self.red.apply_to("✗"));
            }
            Outcome::Cancelled => {
                println!("  {} Job cancelled", self.yellow.apply_to("■"));
            }
        }
    }

    pub fn abandon(&self) {
        self.pb.abandon_with_message("Stopped following");
    }
}

/// Byte-level bar for an upload.
pub struct UploadBar {
    pb: ProgressBar,
}

impl UploadBar {
    pub fn start(file_name: &str, total_bytes: u64) -> Self {
        let pb = ProgressBar::new(total_bytes);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40.green/white}] {bytes}/{total_bytes} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        pb.set_message(file_name.to_string());
        Self { pb }
    }

    /// Progress callback for [`UploadClient::upload_audio`](aidj_client::upload::UploadClient::upload_audio).
    pub fn observer(&self) -> impl Fn(UploadProgress) + Send + Sync + 'static {
        let pb = self.pb.clone();
        move |progress: UploadProgress| pb.set_position(progress.bytes_uploaded)
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

pub fn print_files(files: &[StoredFile]) {
    if files.is_empty() {
        println!("No uploaded files");
        return;
    }
    let dim = Style::new().dim();
    for file in files {
        let created = file.created_at.as_deref().unwrap_or("-");
        println!(
            "{:<40} {:>10}  {}  {}",
            file.name,
            format_size(file.size),
            dim.apply_to(created),
            file.url
        );
    }
    println!("{} file(s)", files.len());
}

fn format_size(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    if bytes as f64 >= MIB {
        format!("{:.2} MB", bytes as f64 / MIB)
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}
