//! Service attribute table builder
//!
//! Lays out the ordered descriptor table for one service. The stack assigns
//! one handle per entry, in the same order, when the table is created.

use super::types::{AttPermissions, AttrDescriptor, CharacteristicProperty};
use crate::att::constants::*;
use crate::uuid::Uuid;

/// Builder for a service attribute table
#[derive(Debug, Clone)]
pub struct ServiceTable {
    attrs: Vec<AttrDescriptor>,
}

impl ServiceTable {
    /// Start a primary service. The declaration is always entry 0.
    pub fn primary(uuid: Uuid) -> Self {
        let decl = AttrDescriptor::new(
            Uuid::from(PRIMARY_SERVICE_UUID),
            AttPermissions::read_only(),
            uuid.to_bytes(),
        )
        .with_auto_rsp();
        Self { attrs: vec![decl] }
    }

    /// Add a characteristic declaration followed by its value attribute
    pub fn characteristic(
        mut self,
        uuid: Uuid,
        properties: CharacteristicProperty,
        perm: AttPermissions,
        initial_value: Vec<u8>,
        max_len: u16,
    ) -> Self {
        self.attrs.push(
            AttrDescriptor::new(
                Uuid::from(CHARACTERISTIC_UUID),
                AttPermissions::read_only(),
                vec![properties.bits()],
            )
            .with_auto_rsp(),
        );
        self.attrs
            .push(AttrDescriptor::new(uuid, perm, initial_value).with_max_len(max_len));
        self
    }

    /// Add a Client Characteristic Configuration descriptor to the last characteristic
    pub fn cccd(mut self) -> Self {
        self.attrs.push(AttrDescriptor::new(
            Uuid::from(CLIENT_CHAR_CONFIG_UUID),
            AttPermissions::read_write(),
            vec![0, 0],
        ));
        self
    }

    /// Add a Characteristic User Description to the last characteristic
    pub fn user_description(mut self, text: &str) -> Self {
        self.attrs.push(
            AttrDescriptor::new(
                Uuid::from(CHAR_USER_DESC_UUID),
                AttPermissions::read_only(),
                text.as_bytes().to_vec(),
            )
            .with_auto_rsp(),
        );
        self
    }

    /// Index the next added entry will occupy
    pub fn next_index(&self) -> usize {
        self.attrs.len()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn build(self) -> Vec<AttrDescriptor> {
        self.attrs
    }
}
