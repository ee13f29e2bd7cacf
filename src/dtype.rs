//! # Data Type Registry Module
//!
//! Questo modulo classifica i file in base all'estensione.
//!
//! ## Responsabilità:
//! - Mapping statico estensione → descrittore (categoria, formato, estensione)
//! - Lookup puro, case-insensitive, senza I/O e senza error path
//! - Predicati `is_image` / `is_video` usati da planner e engine
//! - Tabella dei formati di output supportati (JPEG, MP4)
//!
//! ## Categorie:
//! - `ImageStandard`: immagini decodificabili in-process (JPEG, PNG, TIFF, ...)
//! - `ImageRaw`: file RAW di fotocamere (NEF, CR2, ARW, ...)
//! - `Video`: contenitori video gestiti da FFmpeg (MP4, MKV, MOV, ...)
//! - `Unknown`: estensione non mappata, il file viene copiato verbatim
//!
//! Le estensioni non mappate non sono mai un errore: risolvono a `Unknown`.
//!
//! ## Esempio:
//! ```rust,ignore
//! let descriptor = classify(Path::new("photo.NEF"));
//! assert_eq!(descriptor.category, MediaCategory::ImageRaw);
//! ```

use std::path::Path;

/// Logical category of a media file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaCategory {
    ImageStandard,
    ImageRaw,
    Video,
    Unknown,
}

/// Classification of a file: category, canonical format name and extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTypeDescriptor {
    pub category: MediaCategory,
    pub format_name: &'static str,
    pub canonical_extension: &'static str,
}

/// Standard image formats, decodable in-process
const IMAGE_STANDARD_FORMATS: &[(&str, &[&str])] = &[
    ("BMP", &["bmp"]),
    ("DDS", &["dds"]),
    ("DIB", &["dib"]),
    ("EPS", &["eps", "ps"]),
    ("GIF", &["gif"]),
    ("HEIC", &["heic"]),
    ("ICNS", &["icns"]),
    ("ICO", &["ico"]),
    ("IM", &["im"]),
    ("JPEG", &["jfif", "jpe", "jpeg", "jpg"]),
    ("JPEG2000", &["j2c", "j2k", "jp2", "jpc", "jpf", "jpx"]),
    ("PCX", &["pcx"]),
    ("PNG", &["apng", "png"]),
    ("PPM", &["pbm", "pfm", "pgm", "pnm", "ppm"]),
    ("SGI", &["bw", "rgb", "rgba", "sgi"]),
    ("TGA", &["icb", "tga", "vda", "vst"]),
    ("THM", &["thm"]),
    ("TIFF", &["tif", "tiff"]),
    ("WEBP", &["webp"]),
];

/// Camera RAW formats, keyed by vendor
const IMAGE_RAW_FORMATS: &[(&str, &[&str])] = &[
    ("Generic", &["raw"]),
    ("Adobe", &["dng"]),
    ("Canon", &["cr2", "cr3"]),
    ("Casio", &["bay"]),
    ("Fujifilm", &["raf"]),
    ("Hasselblad", &["3fr", "fff"]),
    ("Kodak", &["k25", "kdc"]),
    ("Leica", &["rwl"]),
    ("Nikon", &["nef", "nrw"]),
    ("Olympus", &["orf"]),
    ("Panasonic", &["rw2"]),
    ("Pentax", &["pef"]),
    ("Phase One", &["iiq"]),
    ("Samsung", &["srw"]),
    ("Sony", &["arw", "srf", "sr2"]),
];

/// Video containers handled through FFmpeg
const VIDEO_FORMATS: &[(&str, &[&str])] = &[
    ("3GP", &["3gp"]),
    ("AVI", &["avi"]),
    ("FLV", &["flv"]),
    ("MKV", &["mkv"]),
    ("MOV", &["mov"]),
    ("MP4", &["mp4"]),
    ("MPEG", &["mpg", "mpeg"]),
    ("MTS", &["mts", "m2ts"]),
    ("OGG", &["ogv", "ogg"]),
    ("VOB", &["vob"]),
    ("WebM", &["webm"]),
    ("WMV", &["wmv"]),
];

/// Supported output formats with their target extension
const OUTPUT_FORMATS: &[(&str, &str)] = &[("JPEG", ".jpg"), ("MP4", ".mp4")];

fn lookup(
    table: &'static [(&'static str, &'static [&'static str])],
    category: MediaCategory,
    ext: &str,
) -> Option<DataTypeDescriptor> {
    for (format_name, extensions) in table {
        if let Some(found) = extensions.iter().find(|e| **e == ext) {
            return Some(DataTypeDescriptor {
                category,
                format_name: *format_name,
                canonical_extension: *found,
            });
        }
    }
    None
}

/// Classify a file by its extension, case-insensitively.
///
/// Pure function: no I/O, never fails. Files without an extension or with an
/// unmapped one resolve to `Unknown`.
pub fn classify(path: &Path) -> DataTypeDescriptor {
    let ext = match path.extension() {
        Some(ext) => ext.to_string_lossy().to_lowercase(),
        None => {
            return DataTypeDescriptor {
                category: MediaCategory::Unknown,
                format_name: "",
                canonical_extension: "",
            }
        }
    };

    lookup(IMAGE_STANDARD_FORMATS, MediaCategory::ImageStandard, &ext)
        .or_else(|| lookup(IMAGE_RAW_FORMATS, MediaCategory::ImageRaw, &ext))
        .or_else(|| lookup(VIDEO_FORMATS, MediaCategory::Video, &ext))
        .unwrap_or(DataTypeDescriptor {
            category: MediaCategory::Unknown,
            format_name: "",
            canonical_extension: "",
        })
}

/// Check if a descriptor is an image for output-rule purposes.
///
/// Standard and RAW images share the image output rule even though they use
/// different decode strategies.
pub fn is_image(descriptor: &DataTypeDescriptor) -> bool {
    matches!(
        descriptor.category,
        MediaCategory::ImageStandard | MediaCategory::ImageRaw
    )
}

/// Check if a descriptor is a video
pub fn is_video(descriptor: &DataTypeDescriptor) -> bool {
    descriptor.category == MediaCategory::Video
}

/// Check whether a format name is in the supported output set
pub fn output_format_supported(fmt: &str) -> bool {
    OUTPUT_FORMATS.iter().any(|(name, _)| *name == fmt)
}

/// List the supported output format names, for error messages
pub fn supported_output_formats() -> Vec<&'static str> {
    OUTPUT_FORMATS.iter().map(|(name, _)| *name).collect()
}
