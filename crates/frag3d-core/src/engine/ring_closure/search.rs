use crate::core::io::tinker::{self, KeyFile, SubmitFile};
use crate::core::zmatrix::ZMatrix;
use crate::engine::config::{ClosingPotential, TinkerConfig};
use crate::engine::error::EngineError;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, instrument, warn};

/// One request to the external conformational search.
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    /// Molecule name; together with `iteration` it namespaces work files.
    pub name: &'a str,
    pub iteration: usize,
    pub zmatrix: &'a ZMatrix,
    /// Attractor atom pairs to pull together.
    pub attractor_pairs: &'a [(usize, usize)],
    pub rotatable_bonds: &'a [(usize, usize)],
}

/// A rotational-space conformational search biased towards ring closure.
pub trait ConformationalSearch: Send + Sync {
    /// Returns the optimised internal coordinates for the requested molecule.
    fn search(&self, request: &SearchRequest<'_>) -> Result<ZMatrix, EngineError>;
}

/// What a finished search process left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    /// Exit code; `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// The last cycle's coordinate file, if the process produced one.
    pub output: Option<PathBuf>,
}

impl ProcessOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == Some(0)
    }
}

/// [`ConformationalSearch`] backed by a Tinker executable.
///
/// Work files are named `<work_dir>/<name>_<iteration>.{int,key,sub,log}` so that
/// concurrent searches never share files.
#[derive(Debug, Clone)]
pub struct TinkerSearch {
    config: TinkerConfig,
    potential: ClosingPotential,
}

impl TinkerSearch {
    pub fn new(config: TinkerConfig, potential: ClosingPotential) -> Self {
        Self { config, potential }
    }

    pub fn basename(&self, name: &str, iteration: usize) -> PathBuf {
        let safe: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.config
            .work_dir
            .join(format!("{}_{}", safe, iteration))
    }

    /// Writes the `.int`, `.key` and `.sub` files and returns the basename.
    pub fn prepare(&self, request: &SearchRequest<'_>) -> Result<PathBuf, EngineError> {
        std::fs::create_dir_all(&self.config.work_dir)
            .map_err(|e| EngineError::io(&self.config.work_dir, e))?;
        let base = self.basename(request.name, request.iteration);
        let int_path = with_extension(&base, "int");

        write_file(&int_path, |w| tinker::write_int(request.zmatrix, w))?;

        let mut keywords = self.config.search_keywords.clone();
        keywords.push(format!("RANDOMSEED        {}", request.iteration + 1));
        let key = KeyFile {
            parameters: self.config.force_field_parameters.clone(),
            keywords,
            attractor_pairs: request.attractor_pairs.to_vec(),
            attraction_strength: self.potential.strength,
            overlap_distance: self.potential.overlap_distance,
        };
        write_file(&with_extension(&base, "key"), |w| key.write_to(w))?;

        let submit = SubmitFile {
            int_file: int_path,
            rotatable_bonds: request.rotatable_bonds.to_vec(),
            search_directions: self.config.search_directions,
            rms_gradient: self.config.rms_gradient,
        };
        write_file(&with_extension(&base, "sub"), |w| submit.write_to(w))?;
        Ok(base)
    }

    /// Runs the executable on prepared files and blocks until it exits.
    ///
    /// Only failing to start the process is an error here; exit status and the
    /// presence of output are reported in the outcome.
    #[instrument(skip_all, fields(base = %base.display()))]
    pub fn invoke(&self, base: &Path) -> Result<ProcessOutcome, EngineError> {
        let submit_path = with_extension(base, "sub");
        let submit = File::open(&submit_path).map_err(|e| EngineError::io(&submit_path, e))?;

        let output = Command::new(&self.config.executable)
            .arg(with_extension(base, "int"))
            .arg("-k")
            .arg(with_extension(base, "key"))
            .stdin(Stdio::from(submit))
            .output()
            .map_err(|e| EngineError::ExternalTool {
                tool: self.tool_name(),
                message: format!("could not be started: {}", e),
                stderr: String::new(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let log_path = with_extension(base, "log");
        std::fs::write(&log_path, &stdout).map_err(|e| EngineError::io(&log_path, e))?;

        let cycles = tinker::count_cycles(&stdout, &self.config.cycle_marker);
        let output_file = (cycles > 0)
            .then(|| tinker::cycle_output_path(base, cycles))
            .filter(|path| path.is_file());
        debug!(status = ?output.status.code(), cycles, "Search process finished.");

        Ok(ProcessOutcome {
            status: output.status.code(),
            stdout,
            stderr,
            output: output_file,
        })
    }

    fn tool_name(&self) -> String {
        self.config.executable.display().to_string()
    }
}

impl ConformationalSearch for TinkerSearch {
    fn search(&self, request: &SearchRequest<'_>) -> Result<ZMatrix, EngineError> {
        let base = self.prepare(request)?;
        let outcome = self.invoke(&base)?;

        if !outcome.succeeded() {
            return Err(EngineError::ExternalTool {
                tool: self.tool_name(),
                message: match outcome.status {
                    Some(code) => format!("exited with status {}", code),
                    None => "terminated by a signal".to_string(),
                },
                stderr: outcome.stderr,
            });
        }
        let Some(path) = outcome.output else {
            warn!(base = %base.display(), "Search produced no coordinate file.");
            return Err(EngineError::ExternalTool {
                tool: self.tool_name(),
                message: format!(
                    "no optimised coordinates found for '{}' (expected '{}' in its log)",
                    base.display(),
                    self.config.cycle_marker
                ),
                stderr: outcome.stderr,
            });
        };

        let file = File::open(&path).map_err(|e| EngineError::io(&path, e))?;
        Ok(tinker::read_int(&mut BufReader::new(file))?)
    }
}

fn with_extension(base: &Path, extension: &str) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

fn write_file(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
) -> Result<(), EngineError> {
    let file = File::create(path).map_err(|e| EngineError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)
        .and_then(|_| writer.flush())
        .map_err(|e| EngineError::io(path, e))
}
