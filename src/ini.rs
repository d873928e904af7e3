// This file contains the INI reader and writer used for ngscloud config files. Everything here
// works with plain strings: giving the values types is the job of config.rs.

// Copyright 2024 Ryan Wick (rrwick@gmail.com)

// This file is part of ngscloud. ngscloud is free software: you can redistribute it and/or
// modify it under the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version. ngscloud
// is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the
// implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details. You should have received a copy of the GNU General Public
// License along with ngscloud. If not, see <http://www.gnu.org/licenses/>.

use std::collections::BTreeMap;
use thiserror::Error;


#[derive(Debug, Error, PartialEq)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}


/// One `[section]` of an INI file. Options keep the order they were read or inserted in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Section {
    options: Vec<(String, String)>,
}

impl Section {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn set(&mut self, key: &str, value: &str) {
        match self.options.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None         => self.options.push((key.to_string(), value.to_string())),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let i = self.options.iter().position(|(k, _)| k == key)?;
        Some(self.options.remove(i).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}


/// The whole document: section name -> section.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptionMap {
    sections: BTreeMap<String, Section>,
}

impl OptionMap {
    pub fn new() -> Self { Self::default() }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    pub fn insert_section(&mut self, name: &str, section: Section) {
        self.sections.insert(name.to_string(), section);
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section)?.get(key)
    }

    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.sections.entry(section.to_string()).or_default().set(key, value);
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.sections.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn with_prefix<'a>(&'a self, prefix: &'a str)
            -> impl Iterator<Item = (&'a str, &'a Section)> + 'a {
        // Yields the sections whose name starts with the prefix (e.g. "cluster "), with the
        // prefix stripped from the name.
        self.sections.iter()
            .filter_map(move |(n, s)| n.strip_prefix(prefix).map(|stripped| (stripped, s)))
    }
}


pub fn parse(text: &str) -> Result<OptionMap, ParseError> {
    let mut map = OptionMap::new();
    let mut current: Option<String> = None;
    for (i, raw_line) in text.lines().enumerate() {
        let line_num = i + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            let name = line[1..line.len() - 1].trim();
            if name.is_empty() {
                return Err(error(line_num, "section name is empty"));
            }
            if map.sections.contains_key(name) {
                return Err(error(line_num, &format!("duplicate section [{}]", name)));
            }
            map.sections.insert(name.to_string(), Section::new());
            current = Some(name.to_string());
            continue;
        }
        let Some(section_name) = current.as_ref() else {
            return Err(error(line_num, "option found before any [section] header"));
        };
        let Some(split) = line.find(['=', ':']) else {
            return Err(error(line_num, &format!("expected 'key = value', found '{}'", line)));
        };
        let key = line[..split].trim().to_lowercase();
        let value = line[split + 1..].trim();
        if key.is_empty() {
            return Err(error(line_num, "option has no key"));
        }
        let section = map.sections.entry(section_name.clone()).or_default();
        if section.contains_key(&key) {
            return Err(error(line_num, &format!("duplicate key '{}' in [{}]", key, section_name)));
        }
        section.options.push((key, value.to_string()));
    }
    Ok(map)
}


fn error(line: usize, message: &str) -> ParseError {
    ParseError { line, message: message.to_string() }
}


pub fn to_string(map: &OptionMap) -> String {
    let mut names: Vec<&String> = map.sections.keys().collect();
    names.sort_by_key(|n| section_rank(n));  // stable, so names stay sorted within a rank
    let mut text = String::new();
    for name in names {
        text.push_str(&format!("[{}]\n", name));
        for (key, value) in map.sections[name].iter() {
            text.push_str(&format!("{} = {}\n", key, value));
        }
        text.push('\n');
    }
    text
}


/// Values (and section names) are trimmed on read and end at a line break, so anything with
/// surrounding whitespace or a line break in it would not read back as written.
pub fn check_value(value: &str) -> Result<(), String> {
    if value.contains(['\n', '\r']) {
        Err("contains a line break".to_string())
    } else if value.trim() != value {
        Err("has leading or trailing whitespace".to_string())
    } else {
        Ok(())
    }
}


fn check_key(key: &str) -> Result<(), String> {
    check_value(key)?;
    if key.is_empty() {
        Err("is empty".to_string())
    } else if key.contains(['=', ':']) {
        Err("contains '=' or ':'".to_string())
    } else if key.starts_with(['#', ';']) {
        Err("starts with a comment character".to_string())
    } else if key.to_lowercase() != key {
        Err("is not lowercase".to_string())
    } else {
        Ok(())
    }
}


/// Lists every section name, key and value in the map that `parse` would not give back
/// unchanged after `to_string`. An empty list means the map is safe to write.
pub fn unwritable(map: &OptionMap) -> Vec<String> {
    let mut problems = Vec::new();
    for (name, section) in map.sections() {
        if name.is_empty() {
            problems.push("section name is empty".to_string());
        } else if let Err(e) = check_value(name) {
            problems.push(format!("section name {:?} {}", name, e));
        }
        for (key, value) in section.iter() {
            if let Err(e) = check_key(key) {
                problems.push(format!("[{}] key {:?} {}", name, key, e));
            }
            if let Err(e) = check_value(value) {
                problems.push(format!("[{}] {} value {:?} {}", name, key, value, e));
            } else if key.starts_with('[') && value.ends_with(']') {
                problems.push(format!("[{}] {} = {} would read back as a section header",
                                      name, key, value));
            }
        }
    }
    problems
}


fn section_rank(name: &str) -> u8 {
    // Sections are written in a fixed order so that config files diff cleanly.
    match name {
        "global"       => 0,
        "aws info"     => 1,
        "contact info" => 2,
        _ if name.starts_with("key ")        => 3,
        _ if name.starts_with("cluster ")    => 4,
        _ if name.starts_with("volume ")     => 5,
        _ if name.starts_with("bioinfoapp ") => 6,
        _ => 7,
    }
}
