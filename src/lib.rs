#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod audio;
pub mod display;
pub mod driver;
pub mod framebuffer;
pub mod host;
pub mod imports;
pub mod memory;
pub mod palette;
pub mod save;
pub mod trace;
pub mod utils;
pub mod wasm4;

#[cfg(feature = "wasmi")]
pub mod wasmi_backend;

#[doc(inline)]
pub use crate::{
    audio::{AudioSink, Tone},
    display::{Canvas, Display},
    driver::{Driver, SharedHost},
    host::{ConsoleHost, Fault, Gamepad, HostConfig, HostError, MouseButtons, OverlayStyle},
    memory::VirtualMemory,
    palette::{ColorResolver, OutputColor, OutputPalette, PaletteCache},
    save::{MemorySave, NoSave, SaveChannel},
};

#[cfg(feature = "wasmi")]
#[doc(inline)]
pub use crate::wasmi_backend::WasmiBackend;

/// Common trait for WebAssembly backends.
///
/// A backend owns the loaded cartridge, its linear memory and the host-function
/// table the cartridge was linked against.
pub trait Backend {
    /// Call the cart's `start()` export. A missing export is a no-op.
    fn call_start(&mut self) -> Result<(), Fault>;
    /// Call the cart's `update()` export. A missing export is a no-op.
    fn call_update(&mut self) -> Result<(), Fault>;
    /// Read access to the cart's memory page.
    fn memory(&self) -> VirtualMemory<&[u8]>;
    /// Write access to the cart's memory page together with the peripherals
    /// the host functions talk to.
    fn hardware_mut(&mut self) -> (VirtualMemory<&mut [u8]>, &mut Peripherals);

    /// Write access to the cart's memory page.
    fn memory_mut(&mut self) -> VirtualMemory<&mut [u8]> {
        self.hardware_mut().0
    }
}

/// The collaborators reachable from guest code through host functions.
pub struct Peripherals {
    pub audio: Box<dyn AudioSink + Send>,
    pub save: Box<dyn SaveChannel + Send>,
}

impl Default for Peripherals {
    fn default() -> Self {
        Self {
            audio: Box::new(audio::NullAudio),
            save: Box::new(NoSave),
        }
    }
}

/// Common trait for reading from game memory.
///
/// A [`Source<T>`] reads from a cart's memory subregion that is
/// defined by the Source's provider. For instance, a [`Source<u8>`] provided
/// for reading the frame buffer will cover reading the frame buffer,
/// but no other regions, where offset 0 marks the first framebuffer byte.
pub trait Source<T>
where
    T: Copy,
{
    /// Read memory at the specified offset, relative to the start
    /// of the memory subregion the [`Source<T>`] covers.
    fn item_at(&self, offset: usize) -> Option<T>;
}

impl<T: Copy> Source<T> for [T] {
    fn item_at(&self, offset: usize) -> Option<T> {
        self.get(offset).copied()
    }
}

impl<T: Copy> Source<T> for Vec<T> {
    fn item_at(&self, offset: usize) -> Option<T> {
        self.get(offset).copied()
    }
}

impl<const N: usize, T: Copy> Source<T> for [T; N] {
    fn item_at(&self, offset: usize) -> Option<T> {
        self.get(offset).copied()
    }
}

/// Common trait for writing to game memory.
///
/// A [`Sink<T>`] writes to a cart's memory region that is defined by the Sink's provider.
/// Like [`Source<T>`], a [`Sink<T>`] may only cover a specific memory subregion.
/// Writes outside the region are dropped.
pub trait Sink<T>
where
    T: Copy,
{
    /// Write memory at the specified offset, relative to the start
    /// of the memory subregion the [`Sink<T>`] covers.
    fn set_item_at(&mut self, offset: usize, item: T);

    /// Fill the entire memory subregion with values of T by
    /// cloning `item`
    fn fill(&mut self, item: T);
}

impl<T: Copy> Sink<T> for [T] {
    fn set_item_at(&mut self, offset: usize, item: T) {
        if let Some(slot) = self.get_mut(offset) {
            *slot = item;
        }
    }

    fn fill(&mut self, item: T) {
        <[T]>::fill(self, item)
    }
}

impl<T: Copy> Sink<T> for Vec<T> {
    fn set_item_at(&mut self, offset: usize, item: T) {
        self.as_mut_slice().set_item_at(offset, item)
    }

    fn fill(&mut self, item: T) {
        <[T]>::fill(self, item)
    }
}

impl<const N: usize, T: Copy> Sink<T> for [T; N] {
    fn set_item_at(&mut self, offset: usize, item: T) {
        self.as_mut_slice().set_item_at(offset, item)
    }

    fn fill(&mut self, item: T) {
        <[T]>::fill(self, item)
    }
}
