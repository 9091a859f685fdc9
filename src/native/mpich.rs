/*!
 * MPICH Runtime
 * Bindings against the MPICH ABI (libmpich)
 */

use super::NativeRuntime;
use crate::core::types::{ErrorCode, ScopeHandle, ThreadLevel, Vendor};
use libc::{c_char, c_int};
use std::ptr;

type MpiComm = c_int;

const MPI_SUCCESS: c_int = 0;
const MPI_COMM_WORLD: MpiComm = 0x4400_0000;
const MPI_COMM_SELF: MpiComm = 0x4400_0001;

#[link(name = "mpich")]
extern "C" {
    fn MPI_Init(argc: *mut c_int, argv: *mut *mut *mut c_char) -> c_int;
    fn MPI_Init_thread(
        argc: *mut c_int,
        argv: *mut *mut *mut c_char,
        required: c_int,
        provided: *mut c_int,
    ) -> c_int;
    fn MPI_Query_thread(provided: *mut c_int) -> c_int;
    fn MPI_Is_thread_main(flag: *mut c_int) -> c_int;
    fn MPI_Finalize() -> c_int;
    fn MPI_Abort(comm: MpiComm, errorcode: c_int) -> c_int;
    fn MPI_Initialized(flag: *mut c_int) -> c_int;
    fn MPI_Finalized(flag: *mut c_int) -> c_int;
    fn MPI_Wtime() -> f64;
    fn MPI_Wtick() -> f64;
}

#[inline]
fn check(status: c_int) -> Result<(), ErrorCode> {
    if status == MPI_SUCCESS {
        Ok(())
    } else {
        Err(ErrorCode(status))
    }
}

#[inline]
fn decode_level(raw: c_int) -> Result<ThreadLevel, ErrorCode> {
    ThreadLevel::from_raw(raw).ok_or(ErrorCode::INTERN)
}

/// libmpich-backed runtime
#[derive(Debug, Default)]
pub struct MpichRuntime;

impl MpichRuntime {
    pub fn new() -> Self {
        Self
    }

    fn flag(query: unsafe extern "C" fn(*mut c_int) -> c_int) -> bool {
        let mut flag: c_int = 0;
        // SAFETY: the query writes a single int through a valid pointer;
        // both MPI_Initialized and MPI_Finalized are callable at any time.
        let status = unsafe { query(&mut flag) };
        status == MPI_SUCCESS && flag != 0
    }
}

impl NativeRuntime for MpichRuntime {
    fn vendor(&self) -> Vendor {
        Vendor::Mpich
    }

    fn init(&self) -> Result<(), ErrorCode> {
        // SAFETY: MPI-2 allows null argc/argv.
        check(unsafe { MPI_Init(ptr::null_mut(), ptr::null_mut()) })
    }

    fn init_thread(&self, required: ThreadLevel) -> Result<ThreadLevel, ErrorCode> {
        let mut provided: c_int = 0;
        // SAFETY: null argc/argv are permitted, provided is a valid out pointer.
        check(unsafe {
            MPI_Init_thread(
                ptr::null_mut(),
                ptr::null_mut(),
                required.as_raw(),
                &mut provided,
            )
        })?;
        decode_level(provided)
    }

    fn query_thread(&self) -> Result<ThreadLevel, ErrorCode> {
        let mut provided: c_int = 0;
        // SAFETY: valid out pointer.
        check(unsafe { MPI_Query_thread(&mut provided) })?;
        decode_level(provided)
    }

    fn is_thread_main(&self) -> Result<bool, ErrorCode> {
        let mut flag: c_int = 0;
        // SAFETY: valid out pointer.
        check(unsafe { MPI_Is_thread_main(&mut flag) })?;
        Ok(flag != 0)
    }

    fn finalize(&self) -> Result<(), ErrorCode> {
        // SAFETY: no arguments; the coordinator calls this at most once.
        check(unsafe { MPI_Finalize() })
    }

    fn abort(&self, scope: ScopeHandle, code: i32) -> Result<(), ErrorCode> {
        let comm = match scope {
            ScopeHandle::World => MPI_COMM_WORLD,
            ScopeHandle::Process => MPI_COMM_SELF,
            ScopeHandle::Raw(raw) => MpiComm::try_from(raw).map_err(|_| ErrorCode::COMM)?,
        };
        // SAFETY: comm is a predefined or caller-supplied communicator handle.
        check(unsafe { MPI_Abort(comm, code) })
    }

    fn initialized(&self) -> bool {
        Self::flag(MPI_Initialized)
    }

    fn finalized(&self) -> bool {
        Self::flag(MPI_Finalized)
    }

    fn wtime(&self) -> f64 {
        // SAFETY: no arguments and no pointers. The standard only defines
        // the result between init and finalize; callers keep to that window.
        unsafe { MPI_Wtime() }
    }

    fn wtick(&self) -> f64 {
        // SAFETY: as above.
        unsafe { MPI_Wtick() }
    }
}
