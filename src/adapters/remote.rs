use crate::config::settings::{LinuxSettings, WindowsSettings};
use crate::domain::model::Credentials;
use crate::domain::ports::PostLaunchCopier;
use crate::utils::error::{MgnError, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Output;
use tempfile::NamedTempFile;
use tokio::process::Command;

const SSH_OPTIONS: [&str; 6] = [
    "-o",
    "StrictHostKeyChecking=no",
    "-o",
    "UserKnownHostsFile=/dev/null",
    "-o",
    "LogLevel=ERROR",
];

fn remote_error(host: &str, message: impl Into<String>) -> MgnError {
    MgnError::RemoteCommandError {
        host: host.to_string(),
        message: message.into(),
    }
}

/// Files to upload: the file itself, or every regular file directly inside
/// the directory (sorted). Subdirectories are skipped.
pub fn collect_upload_files(source: &Path) -> Result<Vec<PathBuf>> {
    if source.is_file() {
        return Ok(vec![source.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(source)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        } else {
            tracing::info!("ignoring the subdirectories... {}", path.display());
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(MgnError::ValidationError {
            message: format!("no files to copy in {}", source.display()),
        });
    }
    Ok(files)
}

/// Escapes text for a double-quoted PowerShell string. PowerShell also
/// accepts the typographic double quotes as delimiters.
pub fn ps_double_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('"');
    for c in value.chars() {
        if matches!(c, '`' | '$' | '"' | '\u{201C}' | '\u{201D}' | '\u{201E}') {
            escaped.push('`');
        }
        escaped.push(c);
    }
    escaped.push('"');
    escaped
}

/// Escapes text for a single-quoted PowerShell string. Any of the single
/// quote variants is doubled.
pub fn ps_single_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('\'');
    for c in value.chars() {
        escaped.push(c);
        if matches!(c, '\'' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}') {
            escaped.push(c);
        }
    }
    escaped.push('\'');
    escaped
}

pub fn ps_credential(creds: &Credentials) -> String {
    format!(
        " -Credential (New-Object System.Management.Automation.PSCredential({}, (ConvertTo-SecureString {} -AsPlainText -Force)))",
        ps_double_quoted(&creds.username),
        ps_double_quoted(&creds.secret)
    )
}

pub fn ps_ensure_dir_command(fqdn: &str, dest: &str, creds: &Credentials) -> String {
    let dest = ps_single_quoted(dest);
    format!(
        "Invoke-Command -ComputerName {} -ScriptBlock {{if (!(Test-Path -Path {dest})) {{New-Item -Path {dest} -ItemType directory}}}}{}",
        ps_single_quoted(fqdn),
        ps_credential(creds),
        dest = dest
    )
}

pub fn ps_copy_command(fqdn: &str, source: &str, dest: &str, creds: &Credentials) -> String {
    let source = format!("{}\\*", source.trim_end_matches('\\'));
    format!(
        "$Session = New-PSSession -ComputerName {}{}\rCopy-Item -Path {} -Destination {} -ToSession $Session",
        ps_single_quoted(fqdn),
        ps_credential(creds),
        ps_single_quoted(&source),
        ps_single_quoted(dest)
    )
}

/// SSH invocation for one host. Holds the private key file, if any, for as
/// long as the connection is needed.
struct SshTarget {
    destination: String,
    password: Option<String>,
    key_file: Option<NamedTempFile>,
}

impl SshTarget {
    fn new(fqdn: &str, creds: &Credentials) -> Result<Self> {
        let key_file = if creds.uses_key() {
            let mut file = NamedTempFile::new()?;
            file.write_all(creds.secret.as_bytes())?;
            if !creds.secret.ends_with('\n') {
                file.write_all(b"\n")?;
            }
            file.flush()?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600))?;
            }
            Some(file)
        } else {
            None
        };

        Ok(Self {
            destination: format!("{}@{}", creds.username, fqdn),
            password: (!creds.uses_key()).then(|| creds.secret.clone()),
            key_file,
        })
    }

    fn command(&self, program: &str) -> Command {
        let mut cmd = match &self.password {
            Some(password) => {
                let mut cmd = Command::new("sshpass");
                cmd.env("SSHPASS", password).arg("-e").arg(program);
                cmd
            }
            None => Command::new(program),
        };
        cmd.args(SSH_OPTIONS);
        if let Some(key) = &self.key_file {
            cmd.arg("-i").arg(key.path()).args(["-o", "BatchMode=yes"]);
        }
        cmd.kill_on_drop(true);
        cmd
    }

    async fn exec(&self, remote_command: &str) -> Result<Output> {
        let mut cmd = self.command("ssh");
        cmd.arg(&self.destination).arg(remote_command);
        run(&self.destination, cmd).await
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<Output> {
        let mut cmd = self.command("scp");
        cmd.arg("-q")
            .arg(local)
            .arg(format!("{}:{}", self.destination, remote));
        run(&self.destination, cmd).await
    }
}

async fn run(host: &str, mut cmd: Command) -> Result<Output> {
    let output = cmd
        .output()
        .await
        .map_err(|e| {
            let program = cmd.as_std().get_program().to_string_lossy().into_owned();
            remote_error(host, format!("failed to spawn {}: {}", program, e))
        })?;
    if !output.status.success() {
        return Err(remote_error(
            host,
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(output)
}

/// Copies scripts with the operator's local tooling: ssh/scp for Linux and
/// PowerShell remoting for Windows.
pub struct ProcessCopier {
    linux: LinuxSettings,
    windows: WindowsSettings,
}

impl ProcessCopier {
    pub fn new(linux: LinuxSettings, windows: WindowsSettings) -> Self {
        Self { linux, windows }
    }

    async fn powershell(&self, fqdn: &str, script: &str) -> Result<()> {
        let output = Command::new(&self.windows.powershell)
            .args(["-NoProfile", "-NonInteractive", "-Command", script])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                remote_error(fqdn, format!("failed to start {}: {}", self.windows.powershell, e))
            })?;

        // PowerShell often exits 0 after a non-terminating error, so the
        // error record in stderr counts as a failure too.
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("ErrorId") || !output.status.success() {
            return Err(remote_error(fqdn, stderr.trim().to_string()));
        }
        Ok(())
    }

    pub fn linux_install_command(&self) -> String {
        let staging = &self.linux.staging_dir;
        let dest = &self.linux.post_launch_dir;
        format!(
            "sudo cp {staging}/* {dest} && sudo chown {user} {dest}/* && sudo chmod +x {dest}/*",
            user = self.linux.replication_user
        )
    }
}

#[async_trait]
impl PostLaunchCopier for ProcessCopier {
    async fn copy_to_windows(&self, fqdn: &str, creds: &Credentials, source: &str) -> Result<()> {
        let dest = &self.windows.post_launch_dir;
        self.powershell(fqdn, &ps_ensure_dir_command(fqdn, dest, creds))
            .await?;
        self.powershell(fqdn, &ps_copy_command(fqdn, source, dest, creds))
            .await
    }

    async fn copy_to_linux(&self, fqdn: &str, creds: &Credentials, source: &Path) -> Result<()> {
        let files = collect_upload_files(source)?;
        let ssh = SshTarget::new(fqdn, creds)?;
        let staging = &self.linux.staging_dir;
        let dest = &self.linux.post_launch_dir;

        ssh.exec(&format!("[ -d {staging} ] || mkdir -p {staging}")).await?;
        ssh.exec(&format!("[ -d '{dest}' ] || sudo mkdir -p '{dest}'")).await?;

        for file in &files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    remote_error(fqdn, format!("invalid file name {}", file.display()))
                })?;
            tracing::debug!("Uploading {} to {}:{}", file.display(), fqdn, staging);
            ssh.upload(file, &format!("{}/{}", staging, name)).await?;
        }

        ssh.exec(&self.linux_install_command()).await?;
        Ok(())
    }
}
