//! Decoding of the parts of a class file the scanner cares about: the type
//! hierarchy and the class-level runtime-visible annotations.

use ristretto_classfile::attributes::{Annotation, AnnotationElement, Attribute};
use ristretto_classfile::{ClassAccessFlags, ClassFile, Constant, ConstantPool};
use std::io::Cursor;
use webscope_api::{AnnotationRecord, ClassInfo, ClassKind, ClassRef, ElementValue};

/// What a class file says about itself.
#[derive(Debug, Clone)]
pub struct DecodedClass {
    pub info: ClassInfo,
    pub annotations: Vec<AnnotationRecord>,
}

pub fn decode(bytes: Vec<u8>) -> Result<DecodedClass, String> {
    let class = ClassFile::from_bytes(&mut Cursor::new(bytes)).map_err(|e| format!("{e:?}"))?;
    let pool = &class.constant_pool;

    let name = class_name(pool, class.this_class)
        .ok_or_else(|| "unresolvable this_class entry".to_string())?;
    let flags = class.access_flags;
    let kind = if flags.contains(ClassAccessFlags::ANNOTATION) {
        ClassKind::Annotation
    } else if flags.contains(ClassAccessFlags::INTERFACE) {
        ClassKind::Interface
    } else if flags.contains(ClassAccessFlags::ENUM) {
        ClassKind::Enum
    } else {
        ClassKind::Class
    };
    let class_ref = ClassRef::new(name, kind).with_access(
        flags.contains(ClassAccessFlags::PUBLIC),
        flags.contains(ClassAccessFlags::ABSTRACT) || kind != ClassKind::Class,
    );

    let mut info = ClassInfo::new(class_ref);
    // java.lang.Object is the only class without a superclass.
    if class.super_class != 0 {
        info.super_class = class_name(pool, class.super_class);
    }
    info.interfaces = class
        .interfaces
        .iter()
        .filter_map(|&index| class_name(pool, index))
        .collect();

    let mut annotations = Vec::new();
    for attribute in &class.attributes {
        if let Attribute::RuntimeVisibleAnnotations {
            annotations: table, ..
        } = attribute
        {
            annotations.extend(table.iter().filter_map(|a| annotation(pool, a)));
        }
    }
    info.annotations = annotations.iter().map(|a| a.type_name.clone()).collect();

    Ok(DecodedClass { info, annotations })
}

fn utf8(pool: &ConstantPool, index: u16) -> Option<String> {
    pool.try_get_utf8(index).ok().map(|s| s.to_string())
}

fn class_name(pool: &ConstantPool, index: u16) -> Option<String> {
    match pool.try_get(index).ok()? {
        Constant::Class(name_index) => utf8(pool, *name_index).map(|n| n.replace('/', ".")),
        _ => None,
    }
}

/// `Lcom/example/Foo;` -> `com.example.Foo`.
fn descriptor_to_name(descriptor: &str) -> String {
    descriptor
        .strip_prefix('L')
        .and_then(|d| d.strip_suffix(';'))
        .unwrap_or(descriptor)
        .replace('/', ".")
}

fn annotation(pool: &ConstantPool, annotation: &Annotation) -> Option<AnnotationRecord> {
    let type_name = descriptor_to_name(&utf8(pool, annotation.type_index)?);
    let mut record = AnnotationRecord::new(type_name);
    for pair in &annotation.elements {
        let (Some(name), Some(value)) = (utf8(pool, pair.name_index), element(pool, &pair.value))
        else {
            continue;
        };
        record = record.with(name, value);
    }
    Some(record)
}

fn element(pool: &ConstantPool, value: &AnnotationElement) -> Option<ElementValue> {
    match value {
        AnnotationElement::String { const_value_index } => {
            utf8(pool, *const_value_index).map(ElementValue::Str)
        }
        AnnotationElement::Int { const_value_index }
        | AnnotationElement::Short { const_value_index }
        | AnnotationElement::Byte { const_value_index }
        | AnnotationElement::Char { const_value_index } => match pool.try_get(*const_value_index).ok()? {
            Constant::Integer(v) => Some(ElementValue::Int(i64::from(*v))),
            _ => None,
        },
        AnnotationElement::Long { const_value_index } => {
            match pool.try_get(*const_value_index).ok()? {
                Constant::Long(v) => Some(ElementValue::Int(*v)),
                _ => None,
            }
        }
        AnnotationElement::Boolean { const_value_index } => {
            match pool.try_get(*const_value_index).ok()? {
                Constant::Integer(v) => Some(ElementValue::Bool(*v != 0)),
                _ => None,
            }
        }
        AnnotationElement::Enum {
            type_name_index,
            const_name_index,
        } => Some(ElementValue::Enum {
            type_name: descriptor_to_name(&utf8(pool, *type_name_index)?),
            constant: utf8(pool, *const_name_index)?,
        }),
        AnnotationElement::Class { class_info_index } => {
            utf8(pool, *class_info_index).map(|d| ElementValue::Class(descriptor_to_name(&d)))
        }
        AnnotationElement::Annotation { annotation: nested } => {
            annotation(pool, nested).map(ElementValue::Annotation)
        }
        AnnotationElement::Array { values } => Some(ElementValue::Array(
            values.iter().filter_map(|v| element(pool, v)).collect(),
        )),
        _ => None,
    }
}
