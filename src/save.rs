//! Persistent storage behind `diskr` and `diskw`.

use std::sync::{Arc, Mutex};

use log::debug;

/// A store for one cart's save data.
///
/// Availability can change at any time (the player owning the data may
/// leave), so callers check [`SaveChannel::can_use`] before every access.
pub trait SaveChannel {
    /// The stored bytes, if there are any.
    fn data(&mut self) -> Option<Vec<u8>>;

    /// Replace the stored bytes, `None` erasing them. Returns whether the
    /// store accepted the write.
    fn set_data(&mut self, data: Option<Vec<u8>>) -> bool;

    fn can_use(&self) -> bool;
}

/// A channel that is never usable.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSave;

impl SaveChannel for NoSave {
    fn data(&mut self) -> Option<Vec<u8>> {
        None
    }

    fn set_data(&mut self, _data: Option<Vec<u8>>) -> bool {
        debug!("no save channel, dropping write");
        false
    }

    fn can_use(&self) -> bool {
        false
    }
}

/// Keeps save data in memory.
#[derive(Clone, Debug)]
pub struct MemorySave {
    data: Option<Vec<u8>>,
    available: bool,
}

impl MemorySave {
    pub fn new() -> Self {
        Self {
            data: None,
            available: true,
        }
    }

    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Some(data),
            available: true,
        }
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn stored(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }
}

impl Default for MemorySave {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveChannel for MemorySave {
    fn data(&mut self) -> Option<Vec<u8>> {
        if !self.available {
            return None;
        }
        self.data.clone()
    }

    fn set_data(&mut self, data: Option<Vec<u8>>) -> bool {
        if !self.available {
            return false;
        }
        self.data = data;
        true
    }

    fn can_use(&self) -> bool {
        self.available
    }
}

/// Shares a channel with the embedder, which keeps the other handle.
impl<S: SaveChannel> SaveChannel for Arc<Mutex<S>> {
    fn data(&mut self) -> Option<Vec<u8>> {
        self.lock().unwrap_or_else(|e| e.into_inner()).data()
    }

    fn set_data(&mut self, data: Option<Vec<u8>>) -> bool {
        self.lock()
            .unwrap_or_else(|e| e.into_inner())
            .set_data(data)
    }

    fn can_use(&self) -> bool {
        self.lock().unwrap_or_else(|e| e.into_inner()).can_use()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_save_is_unusable() {
        let mut save = NoSave;
        assert!(!save.can_use());
        assert!(!save.set_data(Some(vec![1, 2, 3])));
        assert_eq!(save.data(), None);
    }

    #[test]
    fn memory_save_round_trip() {
        let mut save = MemorySave::new();
        assert_eq!(save.data(), None);

        assert!(save.set_data(Some(vec![4, 5])));
        assert_eq!(save.data(), Some(vec![4, 5]));

        assert!(save.set_data(None));
        assert_eq!(save.stored(), None);
    }

    #[test]
    fn memory_save_unavailable() {
        let mut save = MemorySave::with_data(vec![9]);
        save.set_available(false);

        assert!(!save.can_use());
        assert_eq!(save.data(), None);
        assert!(!save.set_data(Some(vec![1])));

        save.set_available(true);
        assert_eq!(save.data(), Some(vec![9]));
    }

    #[test]
    fn shared_save() {
        let shared = Arc::new(Mutex::new(MemorySave::new()));
        let mut channel = Arc::clone(&shared);

        assert!(channel.set_data(Some(vec![7; 3])));
        assert_eq!(shared.lock().unwrap().stored(), Some(&[7u8, 7, 7][..]));

        shared.lock().unwrap().set_available(false);
        assert!(!channel.can_use());
    }
}
