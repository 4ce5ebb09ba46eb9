//! In-memory arena of monitoring objects
//!
//! A [`Snapshot`] is loaded from a JSON document whose relations are given by
//! name. [`Snapshot::link`] turns those names into arena indices and builds
//! lookup maps; a reference to an object that does not exist is an error.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::monitoring::model::*;
use crate::monitoring::MonitoringCore;
use crate::error::{LqlError, Result};

#[derive(Debug, Clone, Default)]
struct Index {
    hosts: HashMap<String, HostId>,
    services: HashMap<(String, String), ServiceId>,
    host_groups: HashMap<String, HostGroupId>,
    service_groups: HashMap<String, ServiceGroupId>,
    contacts: HashMap<String, ContactId>,
    contact_groups: HashMap<String, ContactGroupId>,
    commands: HashMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub status: ProgramStatus,
    pub contacts: Vec<Contact>,
    pub contact_groups: Vec<ContactGroup>,
    pub commands: Vec<Command>,
    pub hosts: Vec<Host>,
    pub services: Vec<Service>,
    pub host_groups: Vec<HostGroup>,
    pub service_groups: Vec<ServiceGroup>,
    pub log: Vec<LogEntry>,

    #[serde(skip)]
    index: Index,
}

fn unique<K, I>(map: &mut HashMap<K, I>, key: K, id: I, what: &str) -> Result<()>
where
    K: std::hash::Hash + Eq + std::fmt::Debug,
{
    if map.contains_key(&key) {
        return Err(LqlError::InvalidSnapshot(format!(
            "duplicate {} {:?}",
            what, key
        )));
    }
    map.insert(key, id);
    Ok(())
}

fn resolve<I: Copy>(map: &HashMap<String, I>, name: &str, what: &str, owner: &str) -> Result<I> {
    map.get(name).copied().ok_or_else(|| {
        LqlError::InvalidSnapshot(format!("{} references unknown {} '{}'", owner, what, name))
    })
}

impl Snapshot {
    /// Parse and link a JSON snapshot
    pub fn from_json(text: &str) -> Result<Self> {
        let mut snapshot: Snapshot = serde_json::from_str(text)
            .map_err(|e| LqlError::InvalidSnapshot(e.to_string()))?;
        snapshot.link()?;
        Ok(snapshot)
    }

    /// Read, parse and link a snapshot file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            LqlError::InvalidSnapshot(format!("cannot read {}: {}", path.display(), e))
        })?;
        let snapshot = Self::from_json(&text)?;
        debug!(
            hosts = snapshot.hosts.len(),
            services = snapshot.services.len(),
            log = snapshot.log.len(),
            "loaded snapshot from {}",
            path.display()
        );
        Ok(snapshot)
    }

    /// Resolve all name references into arena indices
    pub fn link(&mut self) -> Result<()> {
        let mut index = Index::default();

        for (i, contact) in self.contacts.iter_mut().enumerate() {
            contact.id = ContactId(i);
            contact.groups.clear();
            unique(&mut index.contacts, contact.name.clone(), contact.id, "contact")?;
        }
        for (i, group) in self.contact_groups.iter_mut().enumerate() {
            group.id = ContactGroupId(i);
            unique(&mut index.contact_groups, group.name.clone(), group.id, "contact group")?;
            group.member_ids = group
                .members
                .iter()
                .map(|m| resolve(&index.contacts, m, "contact", &group.name))
                .collect::<Result<_>>()?;
            for member in &group.member_ids {
                self.contacts[member.0].groups.push(group.id);
            }
        }
        for (i, command) in self.commands.iter().enumerate() {
            unique(&mut index.commands, command.name.clone(), i, "command")?;
        }

        for (i, host) in self.hosts.iter_mut().enumerate() {
            host.id = HostId(i);
            host.services.clear();
            host.groups.clear();
            host.children.clear();
            unique(&mut index.hosts, host.name.clone(), host.id, "host")?;
            host.contact_ids = host
                .contacts
                .iter()
                .map(|c| resolve(&index.contacts, c, "contact", &host.name))
                .collect::<Result<_>>()?;
            host.contact_group_ids = host
                .contact_groups
                .iter()
                .map(|g| resolve(&index.contact_groups, g, "contact group", &host.name))
                .collect::<Result<_>>()?;
        }
        for i in 0..self.hosts.len() {
            for parent in self.hosts[i].parents.clone() {
                let parent_id = resolve(&index.hosts, &parent, "parent host", &self.hosts[i].name)?;
                self.hosts[parent_id.0].children.push(HostId(i));
            }
        }

        for (i, service) in self.services.iter_mut().enumerate() {
            service.id = ServiceId(i);
            service.groups.clear();
            let owner = format!("service '{}'", service.description);
            service.host = resolve(&index.hosts, &service.host_name, "host", &owner)?;
            unique(
                &mut index.services,
                (service.host_name.clone(), service.description.clone()),
                service.id,
                "service",
            )?;
            service.contact_ids = service
                .contacts
                .iter()
                .map(|c| resolve(&index.contacts, c, "contact", &owner))
                .collect::<Result<_>>()?;
            service.contact_group_ids = service
                .contact_groups
                .iter()
                .map(|g| resolve(&index.contact_groups, g, "contact group", &owner))
                .collect::<Result<_>>()?;
            self.hosts[service.host.0].services.push(service.id);
        }

        for (i, group) in self.host_groups.iter_mut().enumerate() {
            group.id = HostGroupId(i);
            unique(&mut index.host_groups, group.name.clone(), group.id, "host group")?;
            group.member_ids = group
                .members
                .iter()
                .map(|m| resolve(&index.hosts, m, "host", &group.name))
                .collect::<Result<_>>()?;
            for member in &group.member_ids {
                self.hosts[member.0].groups.push(group.id);
            }
        }

        for (i, group) in self.service_groups.iter_mut().enumerate() {
            group.id = ServiceGroupId(i);
            unique(&mut index.service_groups, group.name.clone(), group.id, "service group")?;
            let mut member_ids = Vec::with_capacity(group.members.len());
            for (host_name, description) in &group.members {
                let id = index
                    .services
                    .get(&(host_name.clone(), description.clone()))
                    .copied()
                    .ok_or_else(|| {
                        LqlError::InvalidSnapshot(format!(
                            "{} references unknown service '{};{}'",
                            group.name, host_name, description
                        ))
                    })?;
                member_ids.push(id);
            }
            for member in &member_ids {
                self.services[member.0].groups.push(group.id);
            }
            group.member_ids = member_ids;
        }

        // History may mention objects that no longer exist.
        self.log.sort_by_key(|entry| (entry.time, entry.lineno));
        for entry in &mut self.log {
            entry.host = index.hosts.get(&entry.host_name).copied();
            entry.service = index
                .services
                .get(&(entry.host_name.clone(), entry.service_description.clone()))
                .copied();
            entry.contact = index.contacts.get(&entry.contact_name).copied();
        }

        self.index = index;
        Ok(())
    }
}

impl MonitoringCore for Snapshot {
    fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    fn services(&self) -> &[Service] {
        &self.services
    }

    fn host_groups(&self) -> &[HostGroup] {
        &self.host_groups
    }

    fn service_groups(&self) -> &[ServiceGroup] {
        &self.service_groups
    }

    fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    fn contact_groups(&self) -> &[ContactGroup] {
        &self.contact_groups
    }

    fn commands(&self) -> &[Command] {
        &self.commands
    }

    fn log_entries(&self) -> &[LogEntry] {
        &self.log
    }

    fn status(&self) -> &ProgramStatus {
        &self.status
    }

    fn find_host(&self, name: &str) -> Option<&Host> {
        self.index.hosts.get(name).and_then(|id| self.host(*id))
    }

    fn find_service(&self, host_name: &str, description: &str) -> Option<&Service> {
        self.index
            .services
            .get(&(host_name.to_string(), description.to_string()))
            .and_then(|id| self.service(*id))
    }

    fn find_host_group(&self, name: &str) -> Option<&HostGroup> {
        self.index.host_groups.get(name).and_then(|id| self.host_group(*id))
    }

    fn find_service_group(&self, name: &str) -> Option<&ServiceGroup> {
        self.index
            .service_groups
            .get(name)
            .and_then(|id| self.service_group(*id))
    }

    fn find_contact(&self, name: &str) -> Option<&Contact> {
        self.index.contacts.get(name).and_then(|id| self.contact(*id))
    }

    fn find_contact_group(&self, name: &str) -> Option<&ContactGroup> {
        self.index
            .contact_groups
            .get(name)
            .and_then(|id| self.contact_group(*id))
    }

    fn find_command(&self, name: &str) -> Option<&Command> {
        self.index.commands.get(name).and_then(|i| self.commands.get(*i))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::site;
    use super::*;

    #[test]
    fn test_link_resolves_relations() {
        let s = site();
        let h1 = s.find_host("h1").unwrap();
        assert_eq!(h1.services.len(), 2);
        assert_eq!(h1.groups.len(), 2);
        assert_eq!(h1.children, vec![HostId(2)]);
        let cpu = s.find_service("h2", "CPU").unwrap();
        assert_eq!(s.host(cpu.host).unwrap().name, "h2");
        assert_eq!(s.find_contact("carol").unwrap().groups.len(), 1);
    }

    #[test]
    fn test_log_sorted_and_linked() {
        let s = site();
        let times: Vec<i64> = s.log.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![1700000100, 1700000200, 1700000300, 1700000400]);
        assert!(s.log[2].service.is_some());
        assert!(s.log[3].host.is_none());
    }

    #[test]
    fn test_dangling_reference_is_an_error() {
        let err = Snapshot::from_json(r#"{"services": [{"host_name": "nope", "description": "x"}]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("unknown host 'nope'"));
    }

    #[test]
    fn test_duplicate_host_is_an_error() {
        let err = Snapshot::from_json(r#"{"hosts": [{"name": "a"}, {"name": "a"}]}"#).unwrap_err();
        assert!(err.to_string().contains("duplicate host"));
    }

    #[test]
    fn test_find_by_designation() {
        let s = site();
        assert_eq!(s.find_host_by_designation("db one").unwrap().name, "h2");
        assert_eq!(s.find_host_by_designation("10.0.0.3").unwrap().name, "h3");
        assert_eq!(s.find_host_by_designation("H1").unwrap().name, "h1");
        assert!(s.find_host_by_designation("nowhere").is_none());
    }
}
