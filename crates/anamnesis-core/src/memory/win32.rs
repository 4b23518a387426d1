//! Windows process access via `ReadProcessMemory` / `WriteProcessMemory`.

use std::collections::HashMap;
use std::ffi::c_void;
use std::path::PathBuf;

use tracing::{debug, info};
use windows::Win32::Foundation::{
    BOOL, CloseHandle, ERROR_NOACCESS, ERROR_PARTIAL_COPY, HANDLE, HWND, LPARAM, LUID, S_OK,
    STILL_ACTIVE,
};
use windows::Win32::Security::{
    AdjustTokenPrivileges, LUID_AND_ATTRIBUTES, LookupPrivilegeValueW, PRIVILEGE_SET,
    PrivilegeCheck, SE_PRIVILEGE_ENABLED, TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES, TOKEN_QUERY,
};
use windows::Win32::System::Diagnostics::Debug::{ReadProcessMemory, WriteProcessMemory};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, MODULEENTRY32W, Module32FirstW, Module32NextW, PROCESSENTRY32W,
    Process32FirstW, Process32NextW, TH32CS_SNAPMODULE, TH32CS_SNAPMODULE32, TH32CS_SNAPPROCESS,
};
use windows::Win32::System::Threading::{
    GetCurrentProcess, GetExitCodeProcess, OpenProcess, OpenProcessToken, PROCESS_ALL_ACCESS,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowThreadProcessId, IsHungAppWindow, IsWindowVisible,
};
use windows::core::w;

use crate::error::{Error, Result};
use crate::memory::ProcessMemory;

const PRIVILEGE_SET_ALL_NECESSARY: u32 = 1;

/// An open handle to the game process.
pub struct ProcessHandle {
    handle: HANDLE,
    pid: u32,
    base_address: u64,
    executable_path: PathBuf,
    modules: HashMap<String, u64>,
}

// SAFETY: the process handle is an opaque kernel object reference. The
// memory APIs used here are safe to call concurrently on the same handle.
unsafe impl Send for ProcessHandle {}
unsafe impl Sync for ProcessHandle {}

impl ProcessHandle {
    /// Find the single running process whose executable name contains `name`
    /// (case-insensitive) and open it.
    pub fn find_by_name(name: &str) -> Result<Self> {
        let needle = name.to_lowercase();
        let matches: Vec<(u32, String)> = list_processes()?
            .into_iter()
            .filter(|(_, exe)| exe.to_lowercase().contains(&needle))
            .collect();

        match matches.as_slice() {
            [] => Err(Error::ProcessNotFound(name.to_string())),
            [(pid, exe)] => {
                debug!("Found {} (pid {})", exe, pid);
                Self::open(*pid)
            }
            _ => Err(Error::Attach(format!(
                "multiple processes match '{}': {:?}",
                name,
                matches.iter().map(|(pid, _)| *pid).collect::<Vec<_>>()
            ))),
        }
    }

    /// Open the process with all access rights.
    pub fn open(pid: u32) -> Result<Self> {
        enable_debug_privilege()?;

        // SAFETY: OpenProcess has no memory-safety preconditions; the returned
        // handle is owned by this struct and closed on drop.
        let handle = unsafe { OpenProcess(PROCESS_ALL_ACCESS, true, pid) }
            .map_err(|e| Error::Attach(format!("OpenProcess({}) failed: {}", pid, e)))?;

        let mut process = Self {
            handle,
            pid,
            base_address: 0,
            executable_path: PathBuf::new(),
            modules: HashMap::new(),
        };
        process.load_modules()?;

        if !process.is_responding() {
            return Err(Error::Attach(format!("process {} is not responding", pid)));
        }

        info!(
            "Attached to {} (pid {}, base: {:#x})",
            process.executable_path.display(),
            pid,
            process.base_address
        );
        Ok(process)
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn executable_path(&self) -> &std::path::Path {
        &self.executable_path
    }

    /// Load address of a module by file name (case-insensitive).
    pub fn module_base(&self, name: &str) -> Option<u64> {
        self.modules.get(&name.to_lowercase()).copied()
    }

    fn load_modules(&mut self) -> Result<()> {
        // SAFETY: snapshot handle is closed below.
        let snapshot =
            unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, self.pid) }
                .map_err(|e| Error::Attach(format!("module snapshot failed: {}", e)))?;

        let mut entry = MODULEENTRY32W {
            dwSize: std::mem::size_of::<MODULEENTRY32W>() as u32,
            ..Default::default()
        };

        // SAFETY: entry.dwSize is initialized as the API requires.
        let mut next = unsafe { Module32FirstW(snapshot, &mut entry) };
        let mut first = true;
        while next.is_ok() {
            let name = wide_to_string(&entry.szModule);
            let base = entry.modBaseAddr as u64;
            if first {
                // The first module in a snapshot is the executable itself.
                self.base_address = base;
                self.executable_path = PathBuf::from(wide_to_string(&entry.szExePath));
                first = false;
            }
            if !name.is_empty() {
                self.modules.entry(name.to_lowercase()).or_insert(base);
            }
            // SAFETY: same snapshot and entry as above.
            next = unsafe { Module32NextW(snapshot, &mut entry) };
        }

        // SAFETY: snapshot was returned by CreateToolhelp32Snapshot.
        unsafe {
            let _ = CloseHandle(snapshot);
        }

        if self.base_address == 0 {
            return Err(Error::Attach(format!(
                "no modules found for process {}",
                self.pid
            )));
        }
        Ok(())
    }

    fn has_exited(&self) -> bool {
        let mut code = 0u32;
        // SAFETY: handle is valid for the lifetime of self.
        match unsafe { GetExitCodeProcess(self.handle, &mut code) } {
            Ok(()) => code != STILL_ACTIVE.0 as u32,
            Err(_) => true,
        }
    }

    /// A process without a visible window counts as responding.
    fn is_responding(&self) -> bool {
        match find_window_by_pid(self.pid) {
            // SAFETY: IsHungAppWindow accepts any window handle.
            Some(hwnd) => !unsafe { IsHungAppWindow(hwnd) }.as_bool(),
            None => true,
        }
    }
}

impl ProcessMemory for ProcessHandle {
    fn base_address(&self) -> Result<u64> {
        Ok(self.base_address)
    }

    fn read_into(&self, address: u64, buffer: &mut [u8]) -> Result<()> {
        // SAFETY: the buffer is valid for writes of buffer.len() bytes.
        let result = unsafe {
            ReadProcessMemory(
                self.handle,
                address as *const c_void,
                buffer.as_mut_ptr() as *mut c_void,
                buffer.len(),
                None,
            )
        };

        match result {
            Ok(()) => Ok(()),
            Err(e)
                if e.code() == S_OK
                    || e.code() == ERROR_PARTIAL_COPY.to_hresult()
                    || e.code() == ERROR_NOACCESS.to_hresult() =>
            {
                Ok(())
            }
            Err(e) => Err(Error::MemoryReadFailed {
                address,
                message: e.to_string(),
            }),
        }
    }

    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<usize> {
        let mut written = 0usize;
        // SAFETY: the source buffer is valid for reads of bytes.len() bytes.
        unsafe {
            WriteProcessMemory(
                self.handle,
                address as *const c_void,
                bytes.as_ptr() as *const c_void,
                bytes.len(),
                Some(&mut written),
            )
        }
        .map_err(|e| Error::MemoryWriteFailed {
            address,
            message: e.to_string(),
        })?;
        Ok(written)
    }

    fn is_alive(&self) -> bool {
        !self.handle.is_invalid() && !self.has_exited() && self.is_responding()
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // SAFETY: the handle was opened by us and is closed exactly once.
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}

fn wide_to_string(wide: &[u16]) -> String {
    let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..len])
}

fn list_processes() -> Result<Vec<(u32, String)>> {
    // SAFETY: snapshot handle is closed below.
    let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }
        .map_err(|e| Error::Attach(format!("process snapshot failed: {}", e)))?;

    let mut entry = PROCESSENTRY32W {
        dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
        ..Default::default()
    };
    let mut processes = Vec::new();

    // SAFETY: entry.dwSize is initialized as the API requires.
    let mut next = unsafe { Process32FirstW(snapshot, &mut entry) };
    while next.is_ok() {
        processes.push((entry.th32ProcessID, wide_to_string(&entry.szExeFile)));
        // SAFETY: same snapshot and entry as above.
        next = unsafe { Process32NextW(snapshot, &mut entry) };
    }

    // SAFETY: snapshot was returned by CreateToolhelp32Snapshot.
    unsafe {
        let _ = CloseHandle(snapshot);
    }
    Ok(processes)
}

/// Enable `SeDebugPrivilege` for this process and confirm it took effect.
fn enable_debug_privilege() -> Result<()> {
    let mut token = HANDLE::default();
    // SAFETY: token receives a handle that is closed below.
    unsafe {
        OpenProcessToken(
            GetCurrentProcess(),
            TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
            &mut token,
        )
    }
    .map_err(|e| Error::Attach(format!("OpenProcessToken failed: {}", e)))?;

    let result = adjust_and_check_debug_privilege(token);

    // SAFETY: token was opened above.
    unsafe {
        let _ = CloseHandle(token);
    }
    result
}

fn adjust_and_check_debug_privilege(token: HANDLE) -> Result<()> {
    let mut luid = LUID::default();
    // SAFETY: luid is a valid out pointer.
    unsafe { LookupPrivilegeValueW(None, w!("SeDebugPrivilege"), &mut luid) }
        .map_err(|e| Error::Attach(format!("LookupPrivilegeValue failed: {}", e)))?;

    let privileges = TOKEN_PRIVILEGES {
        PrivilegeCount: 1,
        Privileges: [LUID_AND_ATTRIBUTES {
            Luid: luid,
            Attributes: SE_PRIVILEGE_ENABLED,
        }],
    };
    // SAFETY: privileges outlives the call.
    unsafe { AdjustTokenPrivileges(token, false, Some(&privileges), 0, None, None) }
        .map_err(|e| Error::Attach(format!("AdjustTokenPrivileges failed: {}", e)))?;

    let mut required = PRIVILEGE_SET {
        PrivilegeCount: 1,
        Control: PRIVILEGE_SET_ALL_NECESSARY,
        Privilege: [LUID_AND_ATTRIBUTES {
            Luid: luid,
            Attributes: SE_PRIVILEGE_ENABLED,
        }],
    };
    let mut enabled = BOOL::default();
    // SAFETY: both out pointers are valid.
    unsafe { PrivilegeCheck(token, &mut required, &mut enabled) }
        .map_err(|e| Error::Attach(format!("PrivilegeCheck failed: {}", e)))?;

    if !enabled.as_bool() {
        return Err(Error::Attach("SeDebugPrivilege not enabled".to_string()));
    }
    Ok(())
}

thread_local! {
    static FOUND_HWND: std::cell::Cell<Option<HWND>> = const { std::cell::Cell::new(None) };
}

fn find_window_by_pid(target_pid: u32) -> Option<HWND> {
    FOUND_HWND.with(|cell| cell.set(None));
    // SAFETY: EnumWindows calls the callback for each top-level window; the
    // pid pointer stays valid for the duration of the call.
    unsafe {
        let _ = EnumWindows(
            Some(enum_callback),
            LPARAM(&target_pid as *const u32 as isize),
        );
    }
    FOUND_HWND.with(|cell| cell.take())
}

unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let target_pid = unsafe { *(lparam.0 as *const u32) };
    let mut window_pid: u32 = 0;
    unsafe { GetWindowThreadProcessId(hwnd, Some(&mut window_pid)) };

    if window_pid == target_pid && unsafe { IsWindowVisible(hwnd) }.as_bool() {
        FOUND_HWND.with(|cell| cell.set(Some(hwnd)));
        return BOOL(0);
    }
    BOOL(1)
}
