//! Runtime binding to the libtesseract C API.

use std::ffi::{CStr, CString, OsString};
use std::os::raw::{c_char, c_int, c_void};
use std::path::PathBuf;
use std::ptr;

use libloading::Library;
use tracing::debug;

#[repr(C)]
pub(super) struct TessBaseApi {
    _private: [u8; 0],
}

type TessVersionFn = unsafe extern "C" fn() -> *const c_char;
type TessBaseApiCreateFn = unsafe extern "C" fn() -> *mut TessBaseApi;
type TessBaseApiDeleteFn = unsafe extern "C" fn(*mut TessBaseApi);
type TessBaseApiEndFn = unsafe extern "C" fn(*mut TessBaseApi);
type TessBaseApiInit3Fn =
    unsafe extern "C" fn(*mut TessBaseApi, *const c_char, *const c_char) -> c_int;
type TessBaseApiSetImageFn =
    unsafe extern "C" fn(*mut TessBaseApi, *const u8, c_int, c_int, c_int, c_int);
type TessBaseApiRecognizeFn = unsafe extern "C" fn(*mut TessBaseApi, *mut c_void) -> c_int;
type TessBaseApiGetUtf8TextFn = unsafe extern "C" fn(*mut TessBaseApi) -> *mut c_char;
type TessDeleteTextFn = unsafe extern "C" fn(*const c_char);
type TessBaseApiGetAvailableLanguagesFn =
    unsafe extern "C" fn(*const TessBaseApi) -> *mut *mut c_char;
type TessDeleteTextArrayFn = unsafe extern "C" fn(*mut *mut c_char);

/// Resolved entry points. The function pointers stay valid for as long as
/// `_library` is alive.
pub(super) struct TesseractLibrary {
    version: TessVersionFn,
    create: TessBaseApiCreateFn,
    delete: TessBaseApiDeleteFn,
    end: TessBaseApiEndFn,
    init3: TessBaseApiInit3Fn,
    set_image: TessBaseApiSetImageFn,
    recognize: TessBaseApiRecognizeFn,
    get_utf8_text: TessBaseApiGetUtf8TextFn,
    delete_text: TessDeleteTextFn,
    available_languages: TessBaseApiGetAvailableLanguagesFn,
    delete_text_array: TessDeleteTextArrayFn,
    path: OsString,
    _library: Library,
}

// SAFETY: the struct only holds immutable function pointers and the library
// handle; every call that touches Tesseract state goes through a fresh
// `BaseApi` owned by the caller, and the engine serializes those calls.
unsafe impl Send for TesseractLibrary {}
unsafe impl Sync for TesseractLibrary {}

#[cfg(target_os = "windows")]
const LIBRARY_NAMES: &[&str] = &[
    "libtesseract-5.dll",
    "libtesseract-4.dll",
    "tesseract53.dll",
    "tesseract52.dll",
    "tesseract51.dll",
    "tesseract50.dll",
    "tesseract41.dll",
];

#[cfg(target_os = "macos")]
const LIBRARY_NAMES: &[&str] = &[
    "libtesseract.5.dylib",
    "libtesseract.4.dylib",
    "libtesseract.dylib",
    "/opt/homebrew/lib/libtesseract.dylib",
    "/usr/local/lib/libtesseract.dylib",
];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const LIBRARY_NAMES: &[&str] = &[
    "libtesseract.so.5",
    "libtesseract.so.4",
    "libtesseract.so.3",
    "libtesseract.so",
];

/// Candidate library locations in the order they are tried.
pub(super) fn library_candidates(
    explicit: Option<&OsString>,
    search_dirs: &[PathBuf],
) -> Vec<OsString> {
    if let Some(path) = explicit {
        return vec![path.clone()];
    }
    let mut candidates = Vec::new();
    for dir in search_dirs {
        for name in LIBRARY_NAMES {
            if !name.contains('/') {
                candidates.push(dir.join(name).into_os_string());
            }
        }
    }
    candidates.extend(LIBRARY_NAMES.iter().map(OsString::from));
    candidates
}

impl TesseractLibrary {
    pub(super) fn load(candidates: &[OsString]) -> Result<Self, String> {
        let mut last_error = String::from("no library candidates");
        for candidate in candidates {
            match open_library(candidate) {
                Ok(library) => match Self::bind(library, candidate.clone()) {
                    Ok(bound) => return Ok(bound),
                    Err(err) => {
                        debug!(library = ?candidate, "libtesseract is missing symbols: {err}");
                        last_error = err.to_string();
                    }
                },
                Err(err) => {
                    debug!(library = ?candidate, "failed to open libtesseract: {err}");
                    last_error = err.to_string();
                }
            }
        }
        Err(last_error)
    }

    fn bind(library: Library, path: OsString) -> Result<Self, libloading::Error> {
        // SAFETY: the symbol types match the declarations in tesseract's
        // `capi.h`; the pointers are copied out and kept alongside the
        // library that owns them.
        unsafe {
            let version = *library.get::<TessVersionFn>(b"TessVersion\0")?;
            let create = *library.get::<TessBaseApiCreateFn>(b"TessBaseAPICreate\0")?;
            let delete = *library.get::<TessBaseApiDeleteFn>(b"TessBaseAPIDelete\0")?;
            let end = *library.get::<TessBaseApiEndFn>(b"TessBaseAPIEnd\0")?;
            let init3 = *library.get::<TessBaseApiInit3Fn>(b"TessBaseAPIInit3\0")?;
            let set_image = *library.get::<TessBaseApiSetImageFn>(b"TessBaseAPISetImage\0")?;
            let recognize = *library.get::<TessBaseApiRecognizeFn>(b"TessBaseAPIRecognize\0")?;
            let get_utf8_text =
                *library.get::<TessBaseApiGetUtf8TextFn>(b"TessBaseAPIGetUTF8Text\0")?;
            let delete_text = *library.get::<TessDeleteTextFn>(b"TessDeleteText\0")?;
            let available_languages = *library.get::<TessBaseApiGetAvailableLanguagesFn>(
                b"TessBaseAPIGetAvailableLanguagesAsVector\0",
            )?;
            let delete_text_array =
                *library.get::<TessDeleteTextArrayFn>(b"TessDeleteTextArray\0")?;
            Ok(Self {
                version,
                create,
                delete,
                end,
                init3,
                set_image,
                recognize,
                get_utf8_text,
                delete_text,
                available_languages,
                delete_text_array,
                path,
                _library: library,
            })
        }
    }

    pub(super) fn path(&self) -> &OsString {
        &self.path
    }

    pub(super) fn version(&self) -> Option<String> {
        // SAFETY: TessVersion returns a static NUL-terminated string or null.
        let raw = unsafe { (self.version)() };
        if raw.is_null() {
            return None;
        }
        Some(unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned())
    }

    /// Creates an API handle initialized for `language`. A `None` language
    /// lets Tesseract pick its default (`eng`).
    pub(super) fn init(&self, language: Option<&str>) -> Result<BaseApi<'_>, String> {
        let language = language
            .map(CString::new)
            .transpose()
            .map_err(|_| "language code contains an interior NUL byte".to_string())?;
        // SAFETY: create returns an owned handle released by BaseApi::drop.
        let raw = unsafe { (self.create)() };
        if raw.is_null() {
            return Err("TessBaseAPICreate returned null".into());
        }
        let api = BaseApi { lib: self, raw };
        let language_ptr = language.as_ref().map_or(ptr::null(), |value| value.as_ptr());
        // SAFETY: a null datapath makes Tesseract honour TESSDATA_PREFIX.
        let status = unsafe { (self.init3)(api.raw, ptr::null(), language_ptr) };
        if status != 0 {
            return Err(format!(
                "TessBaseAPIInit3 failed for language '{}' (status {status})",
                language
                    .as_ref()
                    .map(|value| value.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "default".into())
            ));
        }
        Ok(api)
    }
}

/// Owned `TessBaseAPI*`, ended and deleted on drop.
pub(super) struct BaseApi<'a> {
    lib: &'a TesseractLibrary,
    raw: *mut TessBaseApi,
}

impl BaseApi<'_> {
    pub(super) fn available_languages(&self) -> Vec<String> {
        // SAFETY: the handle is initialized; the returned array is
        // NULL-terminated and released with TessDeleteTextArray.
        let array = unsafe { (self.lib.available_languages)(self.raw) };
        if array.is_null() {
            return Vec::new();
        }
        let mut languages = Vec::new();
        let mut cursor = array;
        unsafe {
            while !(*cursor).is_null() {
                languages.push(CStr::from_ptr(*cursor).to_string_lossy().into_owned());
                cursor = cursor.add(1);
            }
            (self.lib.delete_text_array)(array);
        }
        languages
    }

    /// Runs recognition over tightly packed pixels and returns the UTF-8
    /// text.
    pub(super) fn image_to_string(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
    ) -> Result<String, String> {
        let to_int = |value: u32| {
            c_int::try_from(value).map_err(|_| format!("image dimension {value} is too large"))
        };
        let width_i = to_int(width)?;
        let height_i = to_int(height)?;
        let bpp = to_int(bytes_per_pixel)?;
        let bytes_per_line = width_i
            .checked_mul(bpp)
            .ok_or_else(|| "image row length overflowed".to_string())?;

        // SAFETY: `pixels` holds height * bytes_per_line bytes and outlives
        // the recognition below; Tesseract copies the image on SetImage.
        unsafe {
            (self.lib.set_image)(self.raw, pixels.as_ptr(), width_i, height_i, bpp, bytes_per_line);
            if (self.lib.recognize)(self.raw, ptr::null_mut()) != 0 {
                return Err("TessBaseAPIRecognize failed".into());
            }
            let text = (self.lib.get_utf8_text)(self.raw);
            if text.is_null() {
                return Err("TessBaseAPIGetUTF8Text returned null".into());
            }
            let owned = CStr::from_ptr(text).to_string_lossy().into_owned();
            (self.lib.delete_text)(text);
            Ok(owned)
        }
    }
}

impl Drop for BaseApi<'_> {
    fn drop(&mut self) {
        if !self.raw.is_null() {
            unsafe {
                (self.lib.end)(self.raw);
                (self.lib.delete)(self.raw);
            }
            self.raw = ptr::null_mut();
        }
    }
}

#[cfg(target_os = "windows")]
fn open_library(candidate: &OsString) -> Result<Library, libloading::Error> {
    use libloading::os::windows::{LOAD_LIBRARY_SEARCH_DEFAULT_DIRS, Library as WinLibrary};

    // SAFETY: loading libtesseract runs its static initializers, which have
    // no preconditions. The flag makes directories added by the bootstrap
    // through AddDllDirectory part of the search.
    unsafe { WinLibrary::load_with_flags(candidate, LOAD_LIBRARY_SEARCH_DEFAULT_DIRS) }
        .map(Library::from)
}

#[cfg(not(target_os = "windows"))]
fn open_library(candidate: &OsString) -> Result<Library, libloading::Error> {
    // SAFETY: loading libtesseract runs its static initializers, which have
    // no preconditions.
    unsafe { Library::new(candidate) }
}

/// Parses the leading `major.minor` of a Tesseract version string such as
/// `5.3.0`, `4.1.1-rc2-21-gf4ef` or `3.05.02`.
pub(super) fn parse_version(value: &str) -> Option<(u32, u32)> {
    let mut parts = value
        .trim()
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty());
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().and_then(|part| part.parse().ok()).unwrap_or(0);
    Some((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_release_and_development_versions() {
        assert_eq!(parse_version("5.3.0"), Some((5, 3)));
        assert_eq!(parse_version("4.1.1-rc2-21-gf4ef"), Some((4, 1)));
        assert_eq!(parse_version("3.05.02"), Some((3, 5)));
        assert_eq!(parse_version(" 5 "), Some((5, 0)));
        assert_eq!(parse_version("unknown"), None);
        assert_eq!(parse_version(""), None);
    }

    #[test]
    fn explicit_library_overrides_search() {
        let explicit = OsString::from("/opt/tess/libtesseract.so");
        let candidates = library_candidates(Some(&explicit), &[PathBuf::from("/bundle")]);
        assert_eq!(candidates, vec![explicit]);
    }

    #[test]
    fn bundled_directories_are_tried_first() {
        let dir = PathBuf::from("/bundle");
        let candidates = library_candidates(None, &[dir.clone()]);
        let first = PathBuf::from(&candidates[0]);
        assert_eq!(first.parent(), Some(dir.as_path()));
        assert!(candidates.iter().any(|c| c == LIBRARY_NAMES[0]));
    }

    #[test]
    fn loading_a_missing_library_fails_cleanly() {
        let missing = OsString::from("/nonexistent/ocrkit/libtesseract-missing.so");
        assert!(TesseractLibrary::load(&[missing]).is_err());
        assert!(TesseractLibrary::load(&[]).is_err());
    }
}
