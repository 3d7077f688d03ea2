//! WASAPI session enumeration and volume handles.

use std::sync::Arc;

use tracing::{debug, instrument, trace};
use windows::core::{Interface, PWSTR};
use windows::Win32::Foundation::{CloseHandle, HANDLE, MAX_PATH};
use windows::Win32::Media::Audio::Endpoints::{IAudioEndpointVolume, IAudioMeterInformation};
use windows::Win32::Media::Audio::{
    eConsole, eRender, IAudioSessionControl, IAudioSessionControl2, IAudioSessionManager2,
    IMMDevice, IMMDeviceEnumerator, ISimpleAudioVolume, MMDeviceEnumerator,
};
use windows::Win32::System::Com::{CoCreateInstance, CLSCTX_ALL};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
    PROCESS_QUERY_LIMITED_INFORMATION,
};

use crate::backend::{AudioBackend, AudioStream, VolumeControl};
use crate::com::ComScope;
use crate::error::AudioError;
use crate::AudioResult;

/// The Windows audio mixer.
#[derive(Debug, Default)]
pub struct WasapiBackend;

impl WasapiBackend {
    /// Create a backend. COM is initialized per call.
    pub fn new() -> Self {
        Self
    }
}

fn default_render_device() -> AudioResult<IMMDevice> {
    let enumerator: IMMDeviceEnumerator =
        unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)? };

    unsafe {
        enumerator
            .GetDefaultAudioEndpoint(eRender, eConsole)
            .map_err(|e| AudioError::WindowsApi {
                message: "No default render device".to_string(),
                source: Some(e),
            })
    }
}

impl AudioBackend for WasapiBackend {
    #[instrument(name = "wasapi_streams", skip(self))]
    fn streams(&self) -> AudioResult<Vec<AudioStream>> {
        let _com = ComScope::enter()?;

        let device = default_render_device()?;
        let manager: IAudioSessionManager2 = unsafe { device.Activate(CLSCTX_ALL, None)? };
        let sessions = unsafe {
            manager
                .GetSessionEnumerator()
                .map_err(|e| AudioError::Enumeration(e.message().to_string()))?
        };
        let count = unsafe { sessions.GetCount()? };

        let mut streams = Vec::with_capacity(count.max(0) as usize);
        for i in 0..count {
            let control = match unsafe { sessions.GetSession(i) } {
                Ok(control) => control,
                Err(e) => {
                    trace!(index = i, error = %e, "Skipping session");
                    continue;
                }
            };

            if let Some(stream) = session_stream(control) {
                streams.push(stream);
            }
        }

        debug!(count = streams.len(), "Enumerated audio sessions");
        Ok(streams)
    }

    fn open_system_endpoint(&self) -> AudioResult<Box<dyn VolumeControl>> {
        let _com = ComScope::enter()?;

        let device = default_render_device()
            .map_err(|e| AudioError::EndpointUnavailable(e.to_string()))?;
        let endpoint: IAudioEndpointVolume = unsafe { device.Activate(CLSCTX_ALL, None)? };
        Ok(Box::new(EndpointVolume { endpoint }))
    }
}

/// Build a stream from a session, skipping the system sounds session and
/// processes whose name cannot be read.
fn session_stream(control: IAudioSessionControl) -> Option<AudioStream> {
    let control2: IAudioSessionControl2 = control.cast().ok()?;
    let pid = unsafe { control2.GetProcessId() }.unwrap_or(0);
    if pid == 0 {
        return None;
    }

    let process_name = process_name(pid)?;
    let peak = control
        .cast::<IAudioMeterInformation>()
        .ok()
        .and_then(|meter| unsafe { meter.GetPeakValue() }.ok())
        .unwrap_or(0.0);
    let volume: ISimpleAudioVolume = control.cast().ok()?;

    Some(AudioStream {
        process_name,
        peak,
        handle: Arc::new(SessionVolume {
            volume,
            _control: control2,
        }),
    })
}

/// Volume handle for one audio session.
///
/// Field order releases the volume interface before the session control it
/// was obtained from.
struct SessionVolume {
    volume: ISimpleAudioVolume,
    _control: IAudioSessionControl2,
}

// SAFETY: the interfaces are created and used inside the multithreaded
// apartment, whose pointers may be called from any thread in it.
unsafe impl Send for SessionVolume {}
unsafe impl Sync for SessionVolume {}

impl VolumeControl for SessionVolume {
    fn volume(&self) -> AudioResult<f32> {
        let _com = ComScope::enter()?;
        Ok(unsafe { self.volume.GetMasterVolume()? })
    }

    fn set_volume(&self, level: f32) -> AudioResult<()> {
        let _com = ComScope::enter()?;
        unsafe { self.volume.SetMasterVolume(level, std::ptr::null())? };
        Ok(())
    }
}

/// Master volume of the default output device.
struct EndpointVolume {
    endpoint: IAudioEndpointVolume,
}

// SAFETY: see SessionVolume.
unsafe impl Send for EndpointVolume {}
unsafe impl Sync for EndpointVolume {}

impl VolumeControl for EndpointVolume {
    fn volume(&self) -> AudioResult<f32> {
        let _com = ComScope::enter()?;
        Ok(unsafe { self.endpoint.GetMasterVolumeLevelScalar()? })
    }

    fn set_volume(&self, level: f32) -> AudioResult<()> {
        let _com = ComScope::enter()?;
        unsafe {
            self.endpoint
                .SetMasterVolumeLevelScalar(level, std::ptr::null())?
        };
        Ok(())
    }
}

/// Process handle closed on drop.
struct OwnedProcess(HANDLE);

impl Drop for OwnedProcess {
    fn drop(&mut self) {
        let _ = unsafe { CloseHandle(self.0) };
    }
}

/// Executable file name of a process, e.g. "chrome.exe".
pub fn process_name(pid: u32) -> Option<String> {
    let process = OwnedProcess(
        unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) }.ok()?,
    );

    let mut buffer = [0u16; MAX_PATH as usize];
    let mut size = buffer.len() as u32;
    unsafe {
        QueryFullProcessImageNameW(
            process.0,
            PROCESS_NAME_WIN32,
            PWSTR(buffer.as_mut_ptr()),
            &mut size,
        )
    }
    .ok()?;

    let path = String::from_utf16_lossy(&buffer[..size as usize]);
    path.rsplit('\\').next().map(str::to_string)
}
