//! Programmatically-constructed core schemas (RFC 7643 §4, §8).
//!
//! These are instantiations of the schema engine, not part of it: every
//! characteristic here is just data fed through [`Attribute`] and
//! [`SchemaDefinition`] the same way a host's own custom schemas would be.

use super::attribute::{AttrType, Attribute, Direction, Mutability, ReferenceType, Returned, Uniqueness};
use super::definition::SchemaDefinition;

pub const USER_SCHEMA_ID: &str = "urn:ietf:params:scim:schemas:core:2.0:User";
pub const GROUP_SCHEMA_ID: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";
pub const ENTERPRISE_USER_SCHEMA_ID: &str =
    "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";

fn name_attribute() -> Attribute {
    Attribute::complex(
        "name",
        vec![
            Attribute::primitive("formatted", AttrType::String),
            Attribute::primitive("familyName", AttrType::String),
            Attribute::primitive("givenName", AttrType::String),
            Attribute::primitive("middleName", AttrType::String),
            Attribute::primitive("honorificPrefix", AttrType::String),
            Attribute::primitive("honorificSuffix", AttrType::String),
        ],
    )
}

fn multi_valued_string_complex(name: &str, canonical: Vec<&str>) -> Attribute {
    Attribute::complex(
        name,
        vec![
            Attribute::primitive("value", AttrType::String),
            Attribute::primitive("display", AttrType::String),
            Attribute::primitive("type", AttrType::String).canonical_values(canonical),
            Attribute::primitive("primary", AttrType::Boolean),
        ],
    )
    .multi_valued(true)
}

fn address_attribute() -> Attribute {
    Attribute::complex(
        "addresses",
        vec![
            Attribute::primitive("formatted", AttrType::String),
            Attribute::primitive("streetAddress", AttrType::String),
            Attribute::primitive("locality", AttrType::String),
            Attribute::primitive("region", AttrType::String),
            Attribute::primitive("postalCode", AttrType::String),
            Attribute::primitive("country", AttrType::String),
            Attribute::primitive("type", AttrType::String).canonical_values(vec!["work", "home", "other"]),
        ],
    )
    .multi_valued(true)
}

fn group_member_ref_attribute() -> Attribute {
    Attribute::complex(
        "members",
        vec![
            Attribute::primitive("value", AttrType::String).mutability(Mutability::Immutable),
            Attribute::primitive("$ref", AttrType::Reference)
                .reference_types(vec![ReferenceType::Resource("User".into()), ReferenceType::Resource("Group".into())])
                .mutability(Mutability::Immutable),
            Attribute::primitive("display", AttrType::String).mutability(Mutability::Immutable),
        ],
    )
    .multi_valued(true)
}

fn group_ref_attribute() -> Attribute {
    Attribute::complex(
        "groups",
        vec![
            Attribute::primitive("value", AttrType::String).mutability(Mutability::ReadOnly),
            Attribute::primitive("$ref", AttrType::Reference)
                .reference_types(vec![ReferenceType::Resource("Group".into())])
                .mutability(Mutability::ReadOnly),
            Attribute::primitive("display", AttrType::String).mutability(Mutability::ReadOnly),
            Attribute::primitive("type", AttrType::String)
                .canonical_values(vec!["direct", "indirect"])
                .mutability(Mutability::ReadOnly),
        ],
    )
    .multi_valued(true)
    .mutability(Mutability::ReadOnly)
    .returned(Returned::Default)
}

fn x509_certificates_attribute() -> Attribute {
    Attribute::complex(
        "x509Certificates",
        vec![Attribute::primitive("value", AttrType::Binary)],
    )
    .multi_valued(true)
}

/// RFC 7643 §4.1, the `User` resource schema.
pub fn user_schema() -> SchemaDefinition {
    SchemaDefinition::new(
        USER_SCHEMA_ID,
        "User",
        "User Account",
        vec![
            Attribute::primitive("userName", AttrType::String)
                .required(true)
                .uniqueness(Uniqueness::Server),
            name_attribute(),
            Attribute::primitive("displayName", AttrType::String),
            Attribute::primitive("nickName", AttrType::String),
            Attribute::primitive("profileUrl", AttrType::Reference)
                .reference_types(vec![ReferenceType::External]),
            Attribute::primitive("title", AttrType::String),
            Attribute::primitive("userType", AttrType::String),
            Attribute::primitive("preferredLanguage", AttrType::String),
            Attribute::primitive("locale", AttrType::String),
            Attribute::primitive("timezone", AttrType::String),
            Attribute::primitive("active", AttrType::Boolean),
            Attribute::primitive("password", AttrType::String)
                .mutability(Mutability::WriteOnly)
                .returned(Returned::Never)
                .direction(Direction::In),
            multi_valued_string_complex("emails", vec!["work", "home", "other"]),
            multi_valued_string_complex("phoneNumbers", vec!["work", "home", "mobile", "fax", "pager", "other"]),
            multi_valued_string_complex("ims", vec!["aim", "gtalk", "icq", "xmpp", "msn", "skype", "qq", "yahoo"]),
            multi_valued_string_complex("photos", vec!["photo", "thumbnail"]),
            address_attribute(),
            group_ref_attribute(),
            multi_valued_string_complex("entitlements", vec![]),
            multi_valued_string_complex("roles", vec![]),
            x509_certificates_attribute(),
        ],
    )
    .expect("built-in User schema is well-formed")
}

/// RFC 7643 §4.2, the `Group` resource schema.
pub fn group_schema() -> SchemaDefinition {
    SchemaDefinition::new(
        GROUP_SCHEMA_ID,
        "Group",
        "Group",
        vec![
            Attribute::primitive("displayName", AttrType::String).required(true),
            group_member_ref_attribute(),
        ],
    )
    .expect("built-in Group schema is well-formed")
}

/// RFC 7643 §4.3, the Enterprise User extension.
pub fn enterprise_user_extension() -> SchemaDefinition {
    SchemaDefinition::new_extension(
        ENTERPRISE_USER_SCHEMA_ID,
        "EnterpriseUser",
        "Enterprise User",
        vec![
            Attribute::primitive("employeeNumber", AttrType::String),
            Attribute::primitive("costCenter", AttrType::String),
            Attribute::primitive("organization", AttrType::String),
            Attribute::primitive("division", AttrType::String),
            Attribute::primitive("department", AttrType::String),
            Attribute::complex(
                "manager",
                vec![
                    Attribute::primitive("value", AttrType::String),
                    Attribute::primitive("$ref", AttrType::Reference)
                        .reference_types(vec![ReferenceType::Resource("User".into())]),
                    Attribute::primitive("displayName", AttrType::String).mutability(Mutability::ReadOnly),
                ],
            ),
        ],
    )
    .expect("built-in EnterpriseUser extension is well-formed")
}

/// The `User` schema with the Enterprise User extension attached, as shipped
/// by the reference resource type registry (RFC 7643 §4.3).
pub fn user_schema_with_enterprise_extension() -> SchemaDefinition {
    let mut schema = user_schema();
    schema
        .extend(super::definition::ExtendTarget::Schema {
            definition: std::sync::Arc::new(enterprise_user_extension()),
            required: false,
        })
        .expect("extension id is unique on a fresh User schema");
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::definition::AttributeRef;

    #[test]
    fn user_schema_requires_user_name() {
        let schema = user_schema();
        match schema.attribute("userName").unwrap() {
            AttributeRef::Attribute(a) => assert!(a.required),
            _ => panic!("expected attribute"),
        }
    }

    #[test]
    fn group_schema_members_are_immutable() {
        let schema = group_schema();
        match schema.attribute("members.value").unwrap() {
            AttributeRef::Attribute(a) => assert_eq!(a.mutability, Mutability::Immutable),
            _ => panic!("expected attribute"),
        }
    }

    #[test]
    fn enterprise_extension_resolves_by_urn() {
        let schema = user_schema_with_enterprise_extension();
        match schema
            .attribute(&format!("{ENTERPRISE_USER_SCHEMA_ID}:employeeNumber"))
            .unwrap()
        {
            AttributeRef::Attribute(a) => assert_eq!(a.name, "employeeNumber"),
            _ => panic!("expected attribute"),
        }
    }
}
