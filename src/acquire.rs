//! Get images from a container engine.
//!
//! The [`Inspector`](crate::Inspector) only needs a transport archive in
//! the filesystem. The [`ImageSource`] trait abstracts how the archive is
//! obtained. [`DockerCli`] implements it with the `docker` command.

use std::{
    env,
    ffi::{OsStr, OsString},
    fmt,
    io::{self, Write},
    path::Path,
    process::{Command, Output, Stdio},
};

use crate::Reference;

/// Environment variable for the registry user name.
pub const USERNAME_VAR: &str = "DOCKER_USERNAME";

/// Environment variable for the registry password.
pub const PASSWORD_VAR: &str = "DOCKER_PASSWORD";

#[derive(thiserror::Error, Debug)]
pub enum AcquireError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: io::Error,
    },

    #[error("`{command}` failed ({status}): {stderr}")]
    Command {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Provider of transport archives for images.
pub trait ImageSource {
    /// Make the image available in the local engine.
    fn pull(&self, reference: &Reference) -> Result<(), AcquireError>;

    /// Write the image to a transport archive in `archive`.
    fn save(&self, reference: &Reference, archive: &Path) -> Result<(), AcquireError>;
}

/// Credentials for the registry.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Read the credentials from the `DOCKER_USERNAME` and `DOCKER_PASSWORD`
    /// environment variables.
    ///
    /// Returns `None` if any of them is missing or empty.
    pub fn from_env() -> Option<Credentials> {
        let username = env::var(USERNAME_VAR).ok().filter(|u| !u.is_empty())?;
        let password = env::var(PASSWORD_VAR).ok().filter(|p| !p.is_empty())?;
        Some(Credentials { username, password })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// [`ImageSource`] using the `docker` command.
///
/// Any program compatible with the `pull`, `save`, and `login` subcommands
/// of `docker` (like `podman`) can be used with [`DockerCli::with_program`].
#[derive(Debug)]
pub struct DockerCli {
    program: OsString,
    credentials: Option<Credentials>,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    /// Use `docker` from `$PATH`, with the credentials from
    /// [`Credentials::from_env`].
    pub fn new() -> Self {
        DockerCli {
            program: "docker".into(),
            credentials: Credentials::from_env(),
        }
    }

    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Run the program with `args`, and send `input` to its stdin.
    fn run<I, S>(&self, args: I, input: Option<&str>) -> Result<Output, AcquireError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command.args(args);

        let command_line = format!("{command:?}");
        tracing::debug!(command = %command_line, "running");

        let spawn_error = |source: io::Error| AcquireError::Spawn {
            program: self.program.to_string_lossy().into_owned(),
            source,
        };

        let output = match input {
            None => command.stdin(Stdio::null()).output().map_err(spawn_error)?,

            Some(input) => {
                let mut child = command
                    .stdin(Stdio::piped())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .spawn()
                    .map_err(spawn_error)?;

                if let Some(mut stdin) = child.stdin.take() {
                    stdin.write_all(input.as_bytes()).map_err(spawn_error)?;
                }

                child.wait_with_output().map_err(spawn_error)?
            }
        };

        if !output.status.success() {
            return Err(AcquireError::Command {
                command: command_line,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        Ok(output)
    }

    fn login(&self, reference: &Reference, credentials: &Credentials) -> Result<(), AcquireError> {
        let mut args = vec!["login"];

        // Docker Hub is the default for `docker login`.
        if !reference.is_default_registry() {
            args.push(reference.registry);
        }

        args.extend(["--username", credentials.username.as_str(), "--password-stdin"]);

        self.run(args, Some(&credentials.password))?;
        Ok(())
    }
}

impl ImageSource for DockerCli {
    fn pull(&self, reference: &Reference) -> Result<(), AcquireError> {
        if let Some(credentials) = &self.credentials {
            self.login(reference, credentials)?;
        }

        self.run(["pull", "--quiet", "--", reference.source], None)?;
        Ok(())
    }

    fn save(&self, reference: &Reference, archive: &Path) -> Result<(), AcquireError> {
        self.run(
            [
                OsStr::new("save"),
                OsStr::new("--output"),
                archive.as_os_str(),
                OsStr::new("--"),
                OsStr::new(reference.source),
            ],
            None,
        )?;

        Ok(())
    }
}
