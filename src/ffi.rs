//! FFI bindings for Pacekit
//!
//! This module provides C-compatible functions for driving the step-tracking
//! engine from host platforms. All functions use C strings (null-terminated)
//! and return allocated memory that must be freed by the caller using
//! `pace_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::engine::StepTrackingEngine;
use crate::motion::MotionSample;
use crate::stride::StrideEstimator;
use crate::types::{EngineUpdate, UserProfile};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Serialize an engine update, mapping a no-op event to NULL without an
/// error. Callers distinguish the two NULL cases via `pace_last_error`.
fn update_to_cstr(update: Option<EngineUpdate>) -> *mut c_char {
    match update {
        Some(update) => match serde_json::to_string(&update) {
            Ok(json) => string_to_cstr(&json),
            Err(e) => {
                set_last_error(&e.to_string());
                ptr::null_mut()
            }
        },
        None => ptr::null_mut(),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Estimate per-zone stride lengths from a user profile JSON.
///
/// # Safety
/// - `profile_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `pace_free_string`.
/// - Returns NULL on error; call `pace_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pace_estimate_stride(profile_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(profile_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid profile JSON string pointer");
            return ptr::null_mut();
        }
    };

    let profile: UserProfile = match serde_json::from_str(&json_str) {
        Ok(profile) => profile,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let model = StrideEstimator::estimate(&profile);
    match serde_json::to_string(&model) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Engine API
// ============================================================================

/// Opaque handle to a step-tracking engine and the active user profile
pub struct PaceEngineHandle {
    engine: StepTrackingEngine,
    profile: UserProfile,
}

/// Create a new engine for the local day containing `now_ms`.
///
/// `has_step_counter` is non-zero when the platform exposes a cumulative
/// step counter; the counter then owns the step count and detector events
/// contribute only distance, zones, and energy.
///
/// # Safety
/// - Returns a pointer to a newly allocated engine.
/// - Must be freed with `pace_engine_free`.
#[no_mangle]
pub unsafe extern "C" fn pace_engine_new(
    now_ms: i64,
    utc_offset_minutes: i32,
    has_step_counter: i32,
) -> *mut PaceEngineHandle {
    clear_last_error();

    let engine = StepTrackingEngine::start_of_day(now_ms, has_step_counter != 0)
        .with_utc_offset_minutes(utc_offset_minutes);
    let handle = Box::new(PaceEngineHandle {
        engine,
        profile: UserProfile::default(),
    });
    Box::into_raw(handle)
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `pace_engine_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pace_engine_free(engine: *mut PaceEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Replace the active user profile from JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `pace_engine_new`.
/// - `profile_json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `pace_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pace_engine_set_profile(
    engine: *mut PaceEngineHandle,
    profile_json: *const c_char,
) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    let handle = &mut *engine;

    let json_str = match cstr_to_string(profile_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid profile JSON string pointer");
            return -1;
        }
    };

    match serde_json::from_str(&json_str) {
        Ok(profile) => {
            handle.profile = profile;
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Apply a cumulative step-counter sample (total steps since boot).
///
/// # Safety
/// - `engine` must be a valid pointer returned by `pace_engine_new`.
/// - Returns the engine update as JSON (free with `pace_free_string`), or
///   NULL when the sample produced no observable change.
/// - On error, returns NULL with `pace_last_error` set.
#[no_mangle]
pub unsafe extern "C" fn pace_engine_on_counter_sample(
    engine: *mut PaceEngineHandle,
    total_since_boot: f64,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &mut *engine;
    update_to_cstr(handle.engine.on_counter_sample(total_since_boot, now_ms))
}

/// Apply one discrete step-detector event.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `pace_engine_new`.
/// - Returns the engine update as JSON (free with `pace_free_string`).
/// - Returns NULL on error; call `pace_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pace_engine_on_step_event(
    engine: *mut PaceEngineHandle,
    timestamp_ms: i64,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &mut *engine;
    let profile = handle.profile.clone();
    let update = handle.engine.on_step_event(timestamp_ms, now_ms, &profile);
    update_to_cstr(Some(update))
}

/// Feed one raw accelerometer sample (m/s² per axis).
///
/// # Safety
/// - `engine` must be a valid pointer returned by `pace_engine_new`.
/// - Returns the engine update as JSON (free with `pace_free_string`), or
///   NULL when the sample produced no observable change.
/// - On error, returns NULL with `pace_last_error` set.
#[no_mangle]
pub unsafe extern "C" fn pace_engine_on_motion_sample(
    engine: *mut PaceEngineHandle,
    x: f64,
    y: f64,
    z: f64,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &mut *engine;
    let profile = handle.profile.clone();
    let sample = MotionSample { x, y, z };
    update_to_cstr(handle.engine.on_motion_sample(sample, now_ms, &profile))
}

/// Get the current day snapshot as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `pace_engine_new`.
/// - Returns a newly allocated string that must be freed with `pace_free_string`.
/// - Returns NULL on error; call `pace_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pace_engine_metrics_json(engine: *mut PaceEngineHandle) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &*engine;
    match serde_json::to_string(handle.engine.metrics()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Reset the engine to a fresh snapshot for `day_epoch`.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `pace_engine_new`.
/// - Returns the engine update as JSON (free with `pace_free_string`); the
///   outgoing day, when it carried activity, is in its `archived_day`.
/// - Returns NULL on error; call `pace_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pace_engine_reset_for_day(
    engine: *mut PaceEngineHandle,
    day_epoch: i64,
    now_ms: i64,
) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &mut *engine;
    let update = handle.engine.reset_for_day(day_epoch, now_ms);
    update_to_cstr(Some(update))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Pacekit functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Pacekit function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pace_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Pacekit function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn pace_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Pacekit library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn pace_version() -> *const c_char {
    // Use a static CString to avoid allocation
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_ffi_engine_step_events() {
        unsafe {
            let engine = pace_engine_new(0, 0, 0);
            assert!(!engine.is_null());

            let first = pace_engine_on_step_event(engine, 0, 0);
            assert!(!first.is_null());
            pace_free_string(first);

            let second = pace_engine_on_step_event(engine, 500, 500);
            let json = CStr::from_ptr(second).to_str().unwrap();
            assert!(json.contains("\"steps\":2"));
            pace_free_string(second);

            pace_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_counter_no_change_returns_null_without_error() {
        unsafe {
            let engine = pace_engine_new(0, 0, 1);

            let first = pace_engine_on_counter_sample(engine, 1_000.0, 1_000);
            assert!(!first.is_null());
            pace_free_string(first);

            let unchanged = pace_engine_on_counter_sample(engine, 1_000.0, 2_000);
            assert!(unchanged.is_null());
            assert!(pace_last_error().is_null());

            pace_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_set_profile_and_stride() {
        unsafe {
            let engine = pace_engine_new(0, 0, 0);
            let profile =
                CString::new(r#"{"height_cm":180,"sex":"male","stride_scale":1.0}"#).unwrap();

            assert_eq!(pace_engine_set_profile(engine, profile.as_ptr()), 0);

            let bad = CString::new("not json").unwrap();
            assert_eq!(pace_engine_set_profile(engine, bad.as_ptr()), -1);
            assert!(!pace_last_error().is_null());

            pace_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_stateless_stride_estimate() {
        unsafe {
            let profile =
                CString::new(r#"{"height_cm":170,"sex":"other","stride_scale":1.0}"#).unwrap();
            let result = pace_estimate_stride(profile.as_ptr());
            assert!(!result.is_null());

            let json = CStr::from_ptr(result).to_str().unwrap();
            assert!(json.contains("walk_meters"));
            assert!(json.contains("run_meters"));
            pace_free_string(result);
        }
    }

    #[test]
    fn test_ffi_metrics_snapshot_and_reset() {
        unsafe {
            let engine = pace_engine_new(0, 0, 0);

            let step = pace_engine_on_step_event(engine, 0, 0);
            pace_free_string(step);

            let metrics = pace_engine_metrics_json(engine);
            let json = CStr::from_ptr(metrics).to_str().unwrap();
            assert!(json.contains("\"steps\":1"));
            pace_free_string(metrics);

            let reset = pace_engine_reset_for_day(engine, 1, 86_400_000);
            let json = CStr::from_ptr(reset).to_str().unwrap();
            assert!(json.contains("\"day_epoch\":1"));
            assert!(json.contains("archived_day"));
            pace_free_string(reset);

            pace_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_null_engine_errors() {
        unsafe {
            let result = pace_engine_on_step_event(ptr::null_mut(), 0, 0);
            assert!(result.is_null());
            assert!(!pace_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = pace_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
