// OS printer backend: PowerShell/WMI on Windows, CUPS command-line tools elsewhere.
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use super::{PrinterBackend, PrinterError};

/// Printer access through the host operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPrinters;

impl SystemPrinters {
    pub fn new() -> Self {
        Self
    }
}

struct CommandOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl CommandOutput {
    fn into_result(self, fallback: &str) -> Result<String, PrinterError> {
        if self.success {
            return Ok(self.stdout);
        }
        let message = [self.stderr.trim(), self.stdout.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or(fallback)
            .to_string();
        Err(PrinterError::Command(message))
    }
}

async fn run_command(program: &str, args: &[&str]) -> Result<CommandOutput, PrinterError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        command.creation_flags(CREATE_NO_WINDOW);
    }
    let output = command.output().await?;
    Ok(CommandOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Quote a value as a PowerShell/JSON string literal.
#[cfg_attr(not(windows), allow(dead_code))]
fn quoted(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// `ConvertTo-Json` prints a bare string for one printer and an array for several.
#[cfg_attr(not(windows), allow(dead_code))]
fn parse_printer_json(raw: &str) -> Vec<String> {
    match serde_json::from_str::<serde_json::Value>(raw.trim()) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Ok(serde_json::Value::String(name)) => vec![name],
        _ => Vec::new(),
    }
}

/// Parse `lpstat -d`, e.g. `system default destination: Receipt`.
#[cfg_attr(windows, allow(dead_code))]
fn parse_lpstat_default(raw: &str) -> Option<String> {
    raw.lines()
        .find_map(|line| line.split_once("destination:"))
        .map(|(_, name)| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(windows)]
async fn powershell(script: &str, fallback: &str) -> Result<String, PrinterError> {
    run_command("powershell", &["-NoProfile", "-NonInteractive", "-Command", script])
        .await?
        .into_result(fallback)
}

#[cfg(windows)]
#[async_trait]
impl PrinterBackend for SystemPrinters {
    async fn list_printers(&self) -> Result<Vec<String>, PrinterError> {
        let script = "Get-CimInstance -ClassName Win32_Printer | Select-Object -ExpandProperty Name | ConvertTo-Json";
        let stdout = powershell(script, "printer-list-failed").await?;
        Ok(parse_printer_json(&stdout))
    }

    async fn default_printer(&self) -> Result<Option<String>, PrinterError> {
        let script = "$p = (Get-CimInstance -ClassName Win32_Printer | Where-Object { $_.Default -eq $true } | Select-Object -First 1).Name\nif ($p) { Write-Output $p }";
        let stdout = powershell(script, "default-printer-failed").await?;
        let name = stdout.trim();
        Ok((!name.is_empty()).then(|| name.to_string()))
    }

    async fn set_default_printer(&self, name: &str) -> Result<(), PrinterError> {
        let script = format!(
            "$printer = {};\n$wsh = New-Object -ComObject WScript.Network\n$wsh.SetDefaultPrinter($printer)",
            quoted(name.trim())
        );
        powershell(&script, "set-default-printer-failed").await?;
        Ok(())
    }
}

#[cfg(not(windows))]
#[async_trait]
impl PrinterBackend for SystemPrinters {
    async fn list_printers(&self) -> Result<Vec<String>, PrinterError> {
        let stdout = run_command("lpstat", &["-e"]).await?.into_result("printer-list-failed")?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn default_printer(&self) -> Result<Option<String>, PrinterError> {
        let output = run_command("lpstat", &["-d"]).await?;
        // "no system default destination" exits non-zero on some CUPS versions.
        if !output.success && output.stdout.contains("no system default") {
            return Ok(None);
        }
        let stdout = output.into_result("default-printer-failed")?;
        Ok(parse_lpstat_default(&stdout))
    }

    async fn set_default_printer(&self, name: &str) -> Result<(), PrinterError> {
        run_command("lpoptions", &["-d", name.trim()])
            .await?
            .into_result("set-default-printer-failed")?;
        Ok(())
    }
}
