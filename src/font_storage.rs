use std::{collections::HashMap, path::PathBuf, sync::Arc};

/// Font database plus a lazily populated cache of parsed faces.
///
/// Faces are only parsed by `fontdue` the first time a layout pass or the
/// rasterizer asks for them. A face that fails to parse is remembered as
/// unusable so the error is logged once instead of on every layout pass.
pub struct FontStorage {
    font_db: fontdb::Database,
    parsed: HashMap<fontdb::ID, Option<Arc<fontdue::Font>>, fxhash::FxBuildHasher>,
}

impl Default for FontStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl FontStorage {
    pub fn new() -> Self {
        Self {
            font_db: fontdb::Database::new(),
            parsed: HashMap::with_hasher(fxhash::FxBuildHasher::default()),
        }
    }
}

/// Loading fonts into fontdb.
impl FontStorage {
    /// Loads a font from binary data.
    pub fn load_font_binary(&mut self, data: impl Into<Vec<u8>>) {
        self.font_db.load_font_data(data.into());
    }

    /// Loads a font from a file path.
    pub fn load_font_file(&mut self, path: PathBuf) -> Result<(), std::io::Error> {
        self.font_db.load_font_file(path)
    }

    /// Loads all fonts from a directory.
    pub fn load_fonts_dir(&mut self, dir: PathBuf) {
        self.font_db.load_fonts_dir(dir)
    }

    pub fn load_system_fonts(&mut self) {
        self.font_db.load_system_fonts();
    }

    pub fn is_empty(&self) -> bool {
        self.font_db.is_empty()
    }

    pub fn len(&self) -> usize {
        self.font_db.len()
    }
}

/// Face lookup.
impl FontStorage {
    /// Resolves a query to a face id, parsing the face if needed.
    pub fn query(&mut self, query: &fontdb::Query) -> Option<(fontdb::ID, Arc<fontdue::Font>)> {
        let id = self.font_db.query(query)?;
        self.font(id).map(|font| (id, font))
    }

    /// Returns the parsed face for `id`.
    ///
    /// `None` means the id is unknown or the face data could not be parsed.
    pub fn font(&mut self, id: fontdb::ID) -> Option<Arc<fontdue::Font>> {
        if let Some(cached) = self.parsed.get(&id) {
            return cached.clone();
        }

        let parsed = self.font_db.with_face_data(id, |data, index| {
            fontdue::Font::from_bytes(
                data,
                fontdue::FontSettings {
                    collection_index: index,
                    scale: 40.0,
                    load_substitutions: true,
                },
            )
        })?;

        let font = match parsed {
            Ok(font) => Some(Arc::new(font)),
            Err(e) => {
                log::error!("Failed to parse font (id: {:?}): {}", id, e);
                None
            }
        };

        self.parsed.insert(id, font.clone());
        font
    }

    pub fn faces(&self) -> impl Iterator<Item = &fontdb::FaceInfo> {
        self.font_db.faces()
    }
}
