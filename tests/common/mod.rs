//! Shared fixtures for integration tests
//!
//! A [`Fixture`] lays out a package database and an applications directory in
//! a temporary directory, and builds a loader over the builtin plugins
//! configured to read them.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;

use softcenter::core::version::get_api_version;
use softcenter::loader::api::PluginLoader;
use softcenter::notifications::api::new_notification_manager;
use softcenter::plugin::api::PluginManager;
use tempfile::TempDir;

pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let fixture = Self {
            dir: TempDir::new().unwrap(),
        };
        std::fs::create_dir_all(fixture.apps_dir()).unwrap();
        fixture.write_database(&fixture.default_database());
        fixture
    }

    pub fn database_path(&self) -> PathBuf {
        self.dir.path().join("packages.json")
    }

    pub fn apps_dir(&self) -> PathBuf {
        self.dir.path().join("applications")
    }

    pub fn local_package_path(&self) -> PathBuf {
        self.dir.path().join("hello-1.0.noarch.rpm")
    }

    pub fn write_database(&self, json: &str) {
        std::fs::write(self.database_path(), json).unwrap();
    }

    pub fn write_desktop_entry(&self, id: &str, contents: &str) -> PathBuf {
        let path = self.apps_dir().join(id);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn default_database(&self) -> String {
        let editor = self.apps_dir().join("org.gimp.GIMP.desktop");
        format!(
            r#"{{
    "repos": {{ "fedora": "Fedora 41", "updates": "Fedora 41 Updates" }},
    "packages": [
        {{ "name": "gimp", "version": "2.10.38-1", "arch": "x86_64", "repo": "fedora",
          "info": "installed", "summary": "GNU Image Manipulation Program",
          "description": "GIMP is an image editor.", "license": "GPL-3.0-or-later",
          "url": "https://www.gimp.org", "size": 1000,
          "update": {{ "version": "2.10.38-2", "severity": "security", "text": "Fixes a crash" }},
          "files": [{editor:?}] }},
        {{ "name": "gimp", "version": "2.10.38-1", "arch": "x86_64", "repo": "fedora",
          "info": "available", "summary": "GNU Image Manipulation Program" }},
        {{ "name": "inkscape", "version": "1.3", "arch": "x86_64", "repo": "fedora",
          "info": "available", "summary": "Vector graphics editor", "size": 500 }},
        {{ "name": "bash", "version": "5.2", "arch": "x86_64", "repo": "fedora",
          "info": "installed", "summary": "The GNU Bourne Again shell" }}
    ],
    "local_files": [
        {{ "path": {local:?}, "name": "hello", "version": "1.0", "arch": "noarch",
          "info": "available", "summary": "Prints a greeting" }}
    ],
    "distro_upgrades": [
        {{ "id": "fedora-42", "name": "Fedora 42", "version": "42", "summary": "The next release" }}
    ]
}}"#,
            editor = editor.display().to_string(),
            local = self.local_package_path().display().to_string(),
        )
    }

    /// `[plugins.*]` tables pointing every builtin plugin at the fixture
    pub fn plugin_tables(&self) -> HashMap<String, toml::Table> {
        let mut tables = HashMap::new();
        tables.insert(
            "packagekit".to_string(),
            table(&[("database", self.database_path().display().to_string().into())]),
        );
        tables.insert(
            "desktop".to_string(),
            table(&[("dirs", self.apps_dir().display().to_string().into())]),
        );
        tables.insert("steam".to_string(), table(&[("command", "true".into())]));
        tables
    }

    /// Loader over the builtin plugins; the ratings plugins are always left out
    /// as they talk to the network
    pub async fn loader(&self, excluded: &[&str]) -> PluginLoader {
        self.loader_with_tables(excluded, self.plugin_tables()).await
    }

    pub async fn loader_with_tables(
        &self,
        excluded: &[&str],
        tables: HashMap<String, toml::Table>,
    ) -> PluginLoader {
        let manager =
            PluginManager::with_notification_manager(get_api_version(), new_notification_manager());
        let mut excluded: Vec<String> = excluded.iter().map(|s| s.to_string()).collect();
        excluded.push("fedora-tagger".to_string());
        excluded.push("ubuntu-reviews".to_string());
        manager.discover_plugins(&excluded).await.unwrap();
        manager.setup(tables, Some(false)).await.unwrap();
        PluginLoader::new(manager).await
    }
}

pub fn table(entries: &[(&str, toml::Value)]) -> toml::Table {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

pub fn ids(apps: &[std::sync::Arc<softcenter::record::api::App>]) -> Vec<String> {
    apps.iter().map(|app| app.id().to_string()).collect()
}
