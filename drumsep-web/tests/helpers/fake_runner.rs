//! Scripted stand-in for the transcoder and the separation tool
//!
//! Records every invocation and writes the files the real tools would
//! produce, following the separation tool's `<model>/<stem>/no_<component>`
//! convention. Inputs whose bytes contain `CORRUPT` make the separation
//! tool fail.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use drumsep_web::pipeline::{CommandSpec, ProcessOutput, ProcessRunner};

pub const CORRUPT_MARKER: &[u8] = b"CORRUPT";

pub struct FakeRunner {
    calls: Mutex<Vec<CommandSpec>>,
    transcoder_exit: i32,
    separator_exit: i32,
    write_remainder: bool,
}

impl FakeRunner {
    /// Both tools succeed and produce their outputs
    pub fn succeeding() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            transcoder_exit: 0,
            separator_exit: 0,
            write_remainder: true,
        }
    }

    pub fn with_transcoder_exit(mut self, code: i32) -> Self {
        self.transcoder_exit = code;
        self
    }

    pub fn with_separator_exit(mut self, code: i32) -> Self {
        self.separator_exit = code;
        self
    }

    /// Separation tool exits 0 without writing the remainder
    pub fn without_remainder(mut self) -> Self {
        self.write_remainder = false;
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<CommandSpec> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == program)
            .collect()
    }

    fn transcode(&self, cmd: &CommandSpec) -> io::Result<ProcessOutput> {
        if self.transcoder_exit != 0 {
            return Ok(ProcessOutput {
                exit_code: Some(self.transcoder_exit),
                output: "Invalid data found when processing input".to_string(),
            });
        }

        let target = cmd.args.last().map(PathBuf::from).unwrap_or_default();
        std::fs::write(&target, b"RIFF-fake-wav")?;
        Ok(ProcessOutput {
            exit_code: Some(0),
            output: "size=  1234kB time=00:03:00.00".to_string(),
        })
    }

    fn separate(&self, cmd: &CommandSpec) -> io::Result<ProcessOutput> {
        let input = cmd.args.last().map(PathBuf::from).unwrap_or_default();
        let bytes = std::fs::read(&input)?;

        if bytes
            .windows(CORRUPT_MARKER.len())
            .any(|w| w == CORRUPT_MARKER)
        {
            return Ok(ProcessOutput {
                exit_code: Some(1),
                output: "Traceback (most recent call last):\nRuntimeError: corrupt input"
                    .to_string(),
            });
        }

        if self.separator_exit != 0 {
            return Ok(ProcessOutput {
                exit_code: Some(self.separator_exit),
                output: "Separation crashed".to_string(),
            });
        }

        if self.write_remainder {
            let out_dir = value_after(&cmd.args, "-o").unwrap_or_default();
            let model = value_after(&cmd.args, "-n").unwrap_or_default();
            let component = value_after(&cmd.args, "--two-stems").unwrap_or_default();
            let ext = if cmd.args.iter().any(|a| a == "--mp3") {
                "mp3"
            } else if cmd.args.iter().any(|a| a == "--flac") {
                "flac"
            } else {
                "wav"
            };
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            let dir = Path::new(&out_dir).join(&model).join(stem);
            std::fs::create_dir_all(&dir)?;
            let mut content = b"REMAINDER:".to_vec();
            content.extend_from_slice(&bytes);
            std::fs::write(dir.join(format!("no_{}.{}", component, ext)), content)?;
        }

        Ok(ProcessOutput {
            exit_code: Some(0),
            output: "Separated tracks will be stored in the output folder".to_string(),
        })
    }
}

fn value_after(args: &[OsString], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|v| v.to_string_lossy().into_owned())
}

impl ProcessRunner for FakeRunner {
    fn run(&self, command: &CommandSpec) -> io::Result<ProcessOutput> {
        self.calls.lock().unwrap().push(command.clone());

        match command.program.as_str() {
            "ffmpeg" => self.transcode(command),
            "demucs" => self.separate(command),
            _ => Ok(ProcessOutput {
                exit_code: Some(0),
                output: String::new(),
            }),
        }
    }
}
