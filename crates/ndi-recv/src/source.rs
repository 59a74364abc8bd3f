//! NDI source descriptors
//!
//! The runtime describes a source as a pair of borrowed C strings. [`Source`]
//! owns copies of both so a descriptor can be kept past the lifetime of the
//! finder list it came from.

use std::ffi::{CStr, CString};
use std::fmt;

use crate::error::Result;
use crate::ffi::NDIlib_source_t;

/// An owned NDI source descriptor (name plus optional URL address)
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Source {
    name: Option<CString>,
    url: Option<CString>,
}

impl Source {
    /// Source addressed by its NDI name, e.g. `"STUDIO-PC (Camera 1)"`
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            name: Some(CString::new(name)?),
            url: None,
        })
    }

    /// Source addressed by name and URL address, skipping discovery
    pub fn with_url(name: &str, url: &str) -> Result<Self> {
        Ok(Self {
            name: Some(CString::new(name)?),
            url: Some(CString::new(url)?),
        })
    }

    /// Copy a descriptor handed out by the runtime
    ///
    /// # Safety
    ///
    /// Both pointers of `raw` must be null or point at NUL-terminated strings
    /// valid for the duration of the call.
    pub unsafe fn from_raw(raw: &NDIlib_source_t) -> Self {
        let copy = |ptr: *const std::ffi::c_char| {
            if ptr.is_null() {
                None
            } else {
                // SAFETY: guaranteed by the caller
                Some(unsafe { CStr::from_ptr(ptr) }.to_owned())
            }
        };
        Self {
            name: copy(raw.p_ndi_name),
            url: copy(raw.p_url_address),
        }
    }

    /// Borrowed view for the runtime, valid while `self` is alive
    pub fn as_raw(&self) -> NDIlib_source_t {
        NDIlib_source_t {
            p_ndi_name: self.name.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
            p_url_address: self.url.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().and_then(|s| s.to_str().ok())
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().and_then(|s| s.to_str().ok())
    }

    /// True for the empty descriptor, which connects to nothing
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.url.is_none()
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name())
            .field("url", &self.url())
            .finish()
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name(), self.url()) {
            (Some(name), Some(url)) => write!(f, "{} [{}]", name, url),
            (Some(name), None) => write!(f, "{}", name),
            (None, Some(url)) => write!(f, "[{}]", url),
            (None, None) => write!(f, "<none>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NdiError;

    #[test]
    fn test_raw_roundtrip_copies_strings() {
        let source = Source::with_url("STUDIO (Cam 1)", "10.0.0.5:5961").expect("valid");
        let raw = source.as_raw();

        // SAFETY: `raw` borrows from `source`, which is alive
        let copy = unsafe { Source::from_raw(&raw) };
        drop(source);

        assert_eq!(copy.name(), Some("STUDIO (Cam 1)"));
        assert_eq!(copy.url(), Some("10.0.0.5:5961"));
    }

    #[test]
    fn test_empty_source() {
        let source = Source::default();
        assert!(source.is_empty());
        let raw = source.as_raw();
        assert!(raw.p_ndi_name.is_null());
        assert!(raw.p_url_address.is_null());
        assert_eq!(source.to_string(), "<none>");
    }

    #[test]
    fn test_interior_nul_rejected() {
        let err = Source::new("bad\0name").expect_err("nul");
        assert!(matches!(err, NdiError::InvalidString(_)));
    }
}
