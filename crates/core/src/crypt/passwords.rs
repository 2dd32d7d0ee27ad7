use super::{pbe, Error};
use log::*;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::path::Path;

/// Root element used when a new store is created
pub const DEFAULT_ROOT: &str = "passwordFile";

/// Recovers the store password from a numeric seed and a key
///
/// The seed is a run of three digit groups. Each group minus the matching character of
/// the key (cycling through the key) is one character of the password, with negative
/// values wrapping by 255. `None` is returned when the seed length is not a multiple of
/// three, a group is not numeric or the key is empty.
pub fn derive_password(seed: &str, key: &str) -> Option<String> {
    let key: Vec<char> = key.chars().collect();
    if key.is_empty() || seed.len() % 3 != 0 {
        return None;
    }

    seed.as_bytes()
        .chunks(3)
        .enumerate()
        .map(|(i, group)| {
            if !group.iter().all(u8::is_ascii_digit) {
                return None;
            }
            let value: u32 = std::str::from_utf8(group).ok()?.parse().ok()?;
            let shift = key[i % key.len()] as u32;
            let value = if value < shift {
                value + 255 - shift
            } else {
                value - shift
            };
            char::from_u32(value)
        })
        .collect()
}

/// Makes the seed that [`derive_password`] turns back into `password` with the same key
pub fn derive_seed(password: &str, key: &str) -> String {
    let key: Vec<char> = key.chars().collect();
    password
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let shift = if key.is_empty() {
                0
            } else {
                key[i % key.len()] as u32
            };
            let mut value = c as u32 + shift;
            if value > 255 {
                value -= 255;
            }
            format!("{:03}", value)
        })
        .collect()
}

/// The decrypted content of a credential store
///
/// Entries are flattened to dotted names, so `<db><user>x</user></db>` is the entry
/// `db.user`.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialStore {
    root: String,
    entries: BTreeMap<String, String>,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            entries: Default::default(),
        }
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.keys().map(|k| (k, "******")))
            .finish()
    }
}

impl CredentialStore {
    /// Name of the document element
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Gets a secret by its dotted name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|v| v.as_str())
    }

    /// Adds or replaces a secret
    pub fn put<T: Into<String>, U: Into<String>>(&mut self, name: T, value: U) {
        self.entries.insert(name.into(), value.into());
    }

    /// Removes a secret returning its old value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(name)
    }

    /// All entry names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    /// Decrypts a store with the store password
    pub fn load(data: &[u8], password: &str) -> Result<Self, Error> {
        let plain = pbe::decrypt(password, data)?;
        let xml = std::str::from_utf8(&plain).map_err(|e| Error::MalformedStore(e.to_string()))?;
        let store = Self::from_xml(xml)?;
        debug!("Loaded credential store with {} entries", store.entries.len());
        Ok(store)
    }

    /// Encrypts the store with the store password
    pub fn save(&self, password: &str) -> Result<Vec<u8>, Error> {
        pbe::encrypt(password, &self.to_xml()?)
    }

    /// Reads and decrypts a store file using the password derived from `seed` and `key`
    pub fn load_file<P: AsRef<Path>>(path: P, seed: &str, key: &str) -> Result<Self, Error> {
        let password = derive_password(seed, key).ok_or(Error::BadSeed)?;
        let data = std::fs::read(path.as_ref())?;
        Self::load(&data, &password)
    }

    /// Encrypts the store and writes it using the password derived from `seed` and `key`
    pub fn save_file<P: AsRef<Path>>(&self, path: P, seed: &str, key: &str) -> Result<(), Error> {
        let password = derive_password(seed, key).ok_or(Error::BadSeed)?;
        std::fs::write(path.as_ref(), self.save(&password)?)?;
        Ok(())
    }

    /// Parses the plaintext XML form of the store
    pub fn from_xml(xml: &str) -> Result<Self, Error> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut root = None;
        let mut entries = BTreeMap::new();
        // Open elements below the root and whether each has content yet
        let mut open: Vec<(String, bool)> = vec![];

        loop {
            let event = reader
                .read_event()
                .map_err(|e| Error::MalformedStore(e.to_string()))?;
            match event {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if root.is_none() {
                        root = Some(name);
                    } else {
                        if let Some(parent) = open.last_mut() {
                            parent.1 = true;
                        }
                        open.push((name, false));
                    }
                }
                Event::Empty(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if root.is_none() {
                        root = Some(name);
                    } else {
                        if let Some(parent) = open.last_mut() {
                            parent.1 = true;
                        }
                        entries.insert(dotted(&open, &name), String::new());
                    }
                }
                Event::Text(t) => {
                    let value = t
                        .unescape()
                        .map_err(|e| Error::MalformedStore(e.to_string()))?;
                    text_entry(&mut entries, &mut open, value.into_owned());
                }
                Event::CData(t) => {
                    let value = String::from_utf8_lossy(&t.into_inner()).into_owned();
                    text_entry(&mut entries, &mut open, value);
                }
                Event::End(_) => {
                    if let Some((name, has_content)) = open.pop() {
                        if !has_content {
                            entries.insert(dotted(&open, &name), String::new());
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let root = root.ok_or_else(|| Error::MalformedStore("no root element".to_string()))?;
        Ok(Self { root, entries })
    }

    /// Writes the plaintext XML form of the store
    pub fn to_xml(&self) -> Result<Vec<u8>, Error> {
        let mut writer = Writer::new(Vec::new());
        let mut events = vec![
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
            Event::Start(BytesStart::new(self.root.as_str())),
        ];

        // Names are sorted so siblings under one parent are always adjacent
        let mut open: Vec<&str> = vec![];
        for (name, value) in self.entries.iter() {
            let parts: Vec<&str> = name.split('.').collect();
            let (leaf, parents) = match parts.split_last() {
                Some(split) => split,
                None => continue,
            };
            let common = open
                .iter()
                .zip(parents.iter())
                .take_while(|(a, b)| a == b)
                .count();
            while open.len() > common {
                if let Some(closed) = open.pop() {
                    events.push(Event::End(BytesEnd::new(closed)));
                }
            }
            for parent in &parents[common..] {
                events.push(Event::Start(BytesStart::new(*parent)));
                open.push(*parent);
            }
            events.push(Event::Start(BytesStart::new(*leaf)));
            events.push(Event::Text(BytesText::new(value)));
            events.push(Event::End(BytesEnd::new(*leaf)));
        }
        while let Some(closed) = open.pop() {
            events.push(Event::End(BytesEnd::new(closed)));
        }
        events.push(Event::End(BytesEnd::new(self.root.as_str())));

        for event in events {
            writer
                .write_event(event)
                .map_err(|e| Error::MalformedStore(e.to_string()))?;
        }
        Ok(writer.into_inner())
    }
}

fn dotted(open: &[(String, bool)], leaf: &str) -> String {
    open.iter()
        .map(|(n, _)| n.as_str())
        .chain(std::iter::once(leaf))
        .collect::<Vec<_>>()
        .join(".")
}

fn text_entry(entries: &mut BTreeMap<String, String>, open: &mut [(String, bool)], value: String) {
    if let Some((name, has_content)) = open.last_mut() {
        *has_content = true;
        let name = name.clone();
        let parents = &open[..open.len() - 1];
        entries.insert(dotted(parents, &name), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use indoc::indoc;

    #[test]
    fn test_derive_password() {
        // 'a' + 'k' = 97 + 107, 'b' + 'e' = 98 + 101
        assert_eq!(derive_password("204199", "ke").as_deref(), Some("ab"));
        assert_eq!(derive_password("204199204", "ke").as_deref(), Some("aba"));
        // Negative values wrap
        assert_eq!(derive_password("010", "A").as_deref(), Some("\u{c8}"));
    }

    #[test]
    fn test_derive_password_rejects() {
        assert_eq!(derive_password("2041", "ke"), None);
        assert_eq!(derive_password("20a199", "ke"), None);
        assert_eq!(derive_password("+04199", "ke"), None);
        assert_eq!(derive_password("204199", ""), None);
    }

    #[test]
    fn test_seed_round_trip() {
        for (password, key) in &[
            ("storepass", "k"),
            ("P@ssw0rd ~!", "phinms"),
            ("x", "a much longer key than password"),
            ("~~~~", "~~"),
        ] {
            let seed = derive_seed(password, key);
            assert_eq!(seed.len(), password.len() * 3);
            assert!(seed.bytes().all(|b| b.is_ascii_digit()));
            assert_eq!(derive_password(&seed, key).as_deref(), Some(*password));
        }
    }

    #[test]
    fn test_seed_wraps_above_255() {
        let password = "\u{f0}";
        let seed = derive_seed(password, "z");
        assert_eq!(seed, format!("{:03}", 0xf0 + 122 - 255));
        assert_eq!(derive_password(&seed, "z").as_deref(), Some(password));
    }

    #[test]
    fn test_load_sample() {
        let sample = include_bytes!("samples/passwords_sample.bin");
        let store = CredentialStore::load(&sample[..], "phinmsx").unwrap();
        assert_eq!(store.root(), "passwordFile");
        assert_eq!(store.get("keyStorePasswd"), Some("storepass"));
        assert_eq!(store.get("database"), Some("secret&more"));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn test_load_wrong_password() {
        let sample = include_bytes!("samples/passwords_sample.bin");
        assert_matches!(
            CredentialStore::load(&sample[..], "wrong"),
            Err(Error::Cipher(_))
        );
    }

    #[test]
    fn test_nested_entries() {
        let xml = indoc! {r#"
            <?xml version="1.0"?>
            <secrets>
              <db>
                <user>admin</user>
                <pass><![CDATA[a<b]]></pass>
              </db>
              <empty/>
              <blank></blank>
              <top>1</top>
            </secrets>
        "#};
        let store = CredentialStore::from_xml(xml).unwrap();
        assert_eq!(store.root(), "secrets");
        assert_eq!(
            store.names().collect::<Vec<_>>(),
            vec!["blank", "db.pass", "db.user", "empty", "top"]
        );
        assert_eq!(store.get("db.pass"), Some("a<b"));
        assert_eq!(store.get("blank"), Some(""));

        let written = store.to_xml().unwrap();
        let reread = CredentialStore::from_xml(std::str::from_utf8(&written).unwrap()).unwrap();
        assert_eq!(reread, store);
    }

    #[test]
    fn test_save_and_load() {
        let mut store = CredentialStore::default();
        store.put("keyStorePasswd", "storepass");
        store.put("db.user", "a & b");
        let data = store.save("phinmsx").unwrap();
        let loaded = CredentialStore::load(&data, "phinmsx").unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.root(), DEFAULT_ROOT);
    }

    #[test]
    fn test_debug_hides_values() {
        let mut store = CredentialStore::default();
        store.put("keyStorePasswd", "storepass");
        let debug = format!("{:?}", store);
        assert!(debug.contains("keyStorePasswd"));
        assert!(!debug.contains("storepass"));
    }

    #[test]
    fn test_malformed_store() {
        assert_matches!(
            CredentialStore::from_xml(""),
            Err(Error::MalformedStore(_))
        );
        assert_matches!(
            CredentialStore::load(&pbe::encrypt("pw", b"\xff\xfe").unwrap(), "pw"),
            Err(Error::MalformedStore(_))
        );
    }
}
