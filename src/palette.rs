//! Resolution of the four raw palette registers into display colors.

use std::collections::HashMap;

use palette::{FromColor, Lab, Srgb};

use crate::memory::VirtualMemory;

/// Maps a raw `0xRRGGBB` palette value onto a color the display understands.
pub trait ColorResolver {
    type Color: Copy;

    fn resolve(&self, raw: u32) -> Self::Color;
}

/// A resolved palette register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaletteEntry<C> {
    pub raw: u32,
    pub color: C,
}

impl<C> PaletteEntry<C> {
    /// Whether the register has been rewritten since this entry was resolved.
    pub fn is_stale(&self, raw: u32) -> bool {
        self.raw != raw
    }
}

/// Memoizes the resolved color of each palette register.
///
/// An entry is resolved again only when the raw register value changes.
pub struct PaletteCache<R: ColorResolver> {
    resolver: R,
    entries: [Option<PaletteEntry<R::Color>>; 4],
}

impl<R: ColorResolver> PaletteCache<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            entries: [None; 4],
        }
    }

    /// Re-read the palette registers, resolving the ones that changed.
    pub fn update<B: AsRef<[u8]>>(&mut self, memory: &VirtualMemory<B>) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            let raw = memory.palette_color(index);
            match entry {
                Some(current) if !current.is_stale(raw) => {}
                _ => {
                    *entry = Some(PaletteEntry {
                        raw,
                        color: self.resolver.resolve(raw),
                    });
                }
            }
        }
    }

    /// The resolved color of a palette index, once [`PaletteCache::update`] ran.
    #[inline]
    pub fn get_color(&self, index: usize) -> Option<R::Color> {
        self.entries.get(index)?.map(|entry| entry.color)
    }

    pub fn entry(&self, index: usize) -> Option<PaletteEntry<R::Color>> {
        *self.entries.get(index)?
    }

    /// Drop all entries, forcing the next update to resolve every register.
    pub fn invalidate(&mut self) {
        self.entries = [None; 4];
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }
}

impl<R: ColorResolver> std::fmt::Debug for PaletteCache<R>
where
    R::Color: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PaletteCache").field(&self.entries).finish()
    }
}

/// Index into an [`OutputPalette`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct OutputColor(pub u8);

/// The fixed set of colors a display can show.
///
/// Raw values listed as overrides map to a curated color; everything else
/// goes to the perceptually nearest color (CIELAB distance).
#[derive(Clone, Debug)]
pub struct OutputPalette {
    colors: Vec<Srgb<u8>>,
    labs: Vec<Lab>,
    overrides: HashMap<u32, OutputColor>,
}

/// The PICO-8 colors.
const DEFAULT_OUTPUT_COLORS: [u32; 16] = [
    0x000000, 0x1d2b53, 0x7e2553, 0x008751, 0xab5236, 0x5f574f, 0xc2c3c7, 0xfff1e8, 0xff004d,
    0xffa300, 0xffec27, 0x00e436, 0x29adff, 0x83769c, 0xff77a8, 0xffccaa,
];

impl OutputPalette {
    pub fn new(colors: impl IntoIterator<Item = Srgb<u8>>) -> Self {
        let colors: Vec<Srgb<u8>> = colors.into_iter().collect();
        let labs = colors.iter().map(|c| to_lab(*c)).collect();
        Self {
            colors,
            labs,
            overrides: HashMap::new(),
        }
    }

    /// Always resolve `raw` to `color`.
    pub fn with_override(mut self, raw: u32, color: OutputColor) -> Self {
        self.overrides.insert(raw & 0xff_ff_ff, color);
        self
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn rgb(&self, color: OutputColor) -> Option<Srgb<u8>> {
        self.colors.get(color.0 as usize).copied()
    }

    /// The output color closest to `raw`, ignoring overrides.
    pub fn nearest(&self, raw: u32) -> OutputColor {
        let target = to_lab(raw_to_srgb(raw));
        let distance = |lab: &Lab| {
            let (dl, da, db) = (lab.l - target.l, lab.a - target.a, lab.b - target.b);
            dl * dl + da * da + db * db
        };

        self.labs
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| distance(a).total_cmp(&distance(b)))
            .map(|(n, _)| OutputColor(n as u8))
            .unwrap_or_default()
    }
}

impl Default for OutputPalette {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_COLORS.iter().map(|raw| raw_to_srgb(*raw)))
            .with_override(0xe0f8cf, OutputColor(7))
            .with_override(0x86c06c, OutputColor(11))
            .with_override(0x306850, OutputColor(3))
            .with_override(0x071821, OutputColor(1))
    }
}

impl ColorResolver for OutputPalette {
    type Color = OutputColor;

    fn resolve(&self, raw: u32) -> OutputColor {
        match self.overrides.get(&raw) {
            Some(color) => *color,
            None => self.nearest(raw),
        }
    }
}

/// Passes raw values straight through as 24-bit RGB.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrueColor;

impl ColorResolver for TrueColor {
    type Color = Srgb<u8>;

    fn resolve(&self, raw: u32) -> Srgb<u8> {
        raw_to_srgb(raw)
    }
}

pub fn raw_to_srgb(raw: u32) -> Srgb<u8> {
    Srgb::new((raw >> 16) as u8, (raw >> 8) as u8, raw as u8)
}

fn to_lab(color: Srgb<u8>) -> Lab {
    Lab::from_color(color.into_format::<f32>())
}
