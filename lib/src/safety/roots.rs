use std::{
    collections::HashSet,
    env,
};

use super::normalize::{
    normalize,
    NormalizedPath,
};

/// Boot, paging and registry hive files. Critical wherever they live.
const WINDOWS_CRITICAL_FILE_NAMES: &[&str] = &[
    "bootmgr",
    "bootmgr.efi",
    "bootstat.dat",
    "bcd",
    "bcd.log",
    "boot.ini",
    "ntldr",
    "ntdetect.com",
    "hiberfil.sys",
    "pagefile.sys",
    "swapfile.sys",
    "ntoskrnl.exe",
    "ntkrnlpa.exe",
    "hal.dll",
    "winload.exe",
    "winload.efi",
    "winresume.exe",
    "sam",
    "security",
    "software",
    "system",
    "default",
    "ntuser.dat",
    "usrclass.dat",
];

const UNIX_CRITICAL_FILE_NAMES: &[&str] = &["vmlinuz", "initrd.img", "swapfile", "swap.img"];

/// Cleanable children of protected parents, relative to the Windows
/// directory.
const WINDOWS_DIR_SAFE: &[&str] = &[
    "Temp",
    "Prefetch",
    "Logs",
    "Panther",
    "Minidump",
    "LiveKernelReports",
    "memory.dmp",
    "SoftwareDistribution\\Download",
    "SoftwareDistribution\\DeliveryOptimization",
    "Installer\\$PatchCache$",
    "ServiceProfiles\\NetworkService\\AppData\\Local\\Microsoft\\Windows\\DeliveryOptimization\\Cache",
];

/// Cleanable locations relative to ProgramData.
const PROGRAM_DATA_SAFE: &[&str] = &[
    "Microsoft\\Windows\\WER\\ReportQueue",
    "Microsoft\\Windows\\WER\\ReportArchive",
    "Microsoft\\Windows\\WER\\Temp",
    "Microsoft\\Windows Defender\\Scans\\History",
    "Microsoft\\Windows Defender\\Support",
];

const WINDOWS_DIR_DENIED: &[&str] = &[
    "System32",
    "System32\\drivers",
    "System32\\config",
    "System32\\GroupPolicy",
    "System32\\GroupPolicyUsers",
    "SysWOW64",
    "SysWOW64\\GroupPolicy",
    "SysNative",
    "WinSxS",
    "Boot",
    "Servicing",
    "SoftwareDistribution",
    "Installer",
    "SystemApps",
    "ServiceProfiles",
];

const SYSTEM_DRIVE_DENIED: &[&str] = &["Boot", "EFI", "Recovery", "System Volume Information"];

const PROGRAM_FILES_DENIED: &[&str] = &[
    "WindowsApps",
    "Windows Defender",
    "Windows Defender Advanced Threat Protection",
];

const PROGRAM_DATA_DENIED: &[&str] = &[
    "Microsoft\\Windows Defender",
    "Microsoft\\Crypto",
    "Microsoft\\Protect",
    "Microsoft\\Windows\\AppRepository",
    "Microsoft\\Windows\\SystemData",
];

/// Per-user key stores, matched as path segments under any profile.
const WINDOWS_DENIED_SEGMENTS: &[&str] = &[
    "/appdata/roaming/microsoft/crypto/",
    "/appdata/roaming/microsoft/protect/",
    "/appdata/roaming/microsoft/systemcertificates/",
    "/appdata/local/microsoft/windowsapps/",
];

const UNIX_DENIED: &[&str] = &[
    "/bin",
    "/sbin",
    "/boot",
    "/dev",
    "/etc",
    "/efi",
    "/lib",
    "/lib32",
    "/lib64",
    "/libx32",
    "/proc",
    "/sys",
    "/run",
    "/usr/bin",
    "/usr/sbin",
    "/usr/lib",
    "/usr/lib64",
    "/usr/libexec",
    "/var/lib/dpkg",
    "/var/lib/rpm",
    "/System",
    "/private/etc",
];

const UNIX_EXACT: &[&str] = &[
    "/",
    "/usr",
    "/var",
    "/home",
    "/root",
    "/opt",
    "/tmp",
    "/Users",
    "/Library",
    "/Applications",
    "/private",
];

/// Well-known system folders, read from the environment with the stock
/// Windows defaults as fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemLocations {
    pub system_drive: String,
    pub windows_dir: String,
    pub program_files: String,
    pub program_files_x86: String,
    pub program_data: String,
    pub users: String,
}

impl Default for SystemLocations {
    fn default() -> Self {
        Self {
            system_drive: "C:\\".to_string(),
            windows_dir: "C:\\Windows".to_string(),
            program_files: "C:\\Program Files".to_string(),
            program_files_x86: "C:\\Program Files (x86)".to_string(),
            program_data: "C:\\ProgramData".to_string(),
            users: "C:\\Users".to_string(),
        }
    }
}

impl SystemLocations {
    pub fn from_environment() -> Self {
        let defaults = Self::default();
        let var = |names: &[&str], fallback: &str| {
            names
                .iter()
                .find_map(|name| env::var(name).ok().filter(|value| !value.trim().is_empty()))
                .unwrap_or_else(|| fallback.to_string())
        };

        let mut system_drive = var(&["SystemDrive"], &defaults.system_drive);
        if !system_drive.ends_with(['\\', '/']) {
            system_drive.push('\\');
        }

        Self {
            users: format!("{}Users", system_drive),
            windows_dir: var(&["SystemRoot", "WINDIR"], &defaults.windows_dir),
            program_files: var(&["ProgramW6432", "ProgramFiles"], &defaults.program_files),
            program_files_x86: var(&["ProgramFiles(x86)"], &defaults.program_files_x86),
            program_data: var(&["ProgramData", "ALLUSERSPROFILE"], &defaults.program_data),
            system_drive,
        }
    }
}

/// The static part of the gate: built once, read-only afterwards.
#[derive(Debug)]
pub(super) struct CriticalRoots {
    pub file_names: HashSet<&'static str>,
    pub allowed: Vec<NormalizedPath>,
    pub denied: Vec<NormalizedPath>,
    pub denied_segments: Vec<&'static str>,
    pub exact: Vec<NormalizedPath>,
    /// Direct children of this directory (user profiles) are critical.
    pub profiles_parent: Option<NormalizedPath>,
}

impl CriticalRoots {
    pub fn build(locations: &SystemLocations) -> Self {
        let mut roots = Self {
            file_names: WINDOWS_CRITICAL_FILE_NAMES
                .iter()
                .chain(UNIX_CRITICAL_FILE_NAMES)
                .copied()
                .collect(),
            allowed: Vec::new(),
            denied: Vec::new(),
            denied_segments: WINDOWS_DENIED_SEGMENTS.to_vec(),
            exact: Vec::new(),
            profiles_parent: parse(&locations.users),
        };

        let windows = locations.windows_dir.as_str();
        let data = locations.program_data.as_str();
        roots.allowed.extend(under(windows, WINDOWS_DIR_SAFE));
        roots.allowed.extend(under(data, PROGRAM_DATA_SAFE));

        roots.denied.extend(parse(windows));
        roots.denied.extend(under(windows, WINDOWS_DIR_DENIED));
        roots.denied.extend(under(&locations.system_drive, SYSTEM_DRIVE_DENIED));
        roots.denied.extend(under(&locations.program_files, PROGRAM_FILES_DENIED));
        roots.denied.extend(under(&locations.program_files_x86, PROGRAM_FILES_DENIED));
        roots.denied.extend(under(data, PROGRAM_DATA_DENIED));
        roots.denied.extend(UNIX_DENIED.iter().filter_map(|path| parse(path)));

        roots.exact.extend(
            [
                &locations.system_drive,
                &locations.users,
                &locations.program_files,
                &locations.program_files_x86,
                &locations.program_data,
            ]
            .into_iter()
            .filter_map(|path| parse(path)),
        );
        roots.exact.extend(UNIX_EXACT.iter().filter_map(|path| parse(path)));

        roots
    }
}

fn parse(path: &str) -> Option<NormalizedPath> {
    normalize(path).ok().flatten()
}

fn under<'a>(base: &'a str, children: &'a [&'a str]) -> impl Iterator<Item = NormalizedPath> + 'a {
    let base = base.trim_end_matches(['\\', '/']);
    children
        .iter()
        .filter_map(move |child| parse(&format!("{}\\{}", base, child)))
}
