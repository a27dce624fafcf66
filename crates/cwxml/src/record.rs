//! Records: types bound to an element through a constant field table.

use xmltree::Element;

use crate::error::XmlResult;
use crate::ElementPath;

/// A type that can be read from and written to a single element.
pub trait XmlElement: Sized {
    /// Read the value from `element`, which lives at `path`.
    fn from_element(element: &Element, path: &ElementPath) -> XmlResult<Self>;

    /// Write the value as an element named `tag`.
    ///
    /// Returning `None` omits the element entirely.
    fn to_element(&self, tag: &str) -> Option<Element>;
}

/// One entry of a record's field table.
///
/// `read` pulls the field out of the record's element, `write` appends it.
/// Both are plain function pointers so the table can be a constant.
pub struct Field<T> {
    pub tag: &'static str,
    pub read: fn(&mut T, &Element, &ElementPath) -> XmlResult<()>,
    pub write: fn(&T, &mut Element),
}

/// A record with a fixed, ordered field table.
///
/// The same table drives reading and writing, so emission order always
/// matches declaration order. Build the table with [`schema!`](crate::schema).
pub trait Record: Default + 'static {
    const FIELDS: &'static [Field<Self>];

    /// Hook run after every field has been read.
    fn after_read(&mut self, _path: &ElementPath) -> XmlResult<()> {
        Ok(())
    }

    /// Read every field of the table from `element`.
    fn read_fields(element: &Element, path: &ElementPath) -> XmlResult<Self> {
        let mut record = Self::default();
        for field in Self::FIELDS {
            (field.read)(&mut record, element, path)?;
        }
        record.after_read(path)?;
        Ok(record)
    }

    /// Append every field of the table to `element`.
    fn write_fields(&self, element: &mut Element) {
        for field in Self::FIELDS {
            (field.write)(self, element);
        }
    }
}

impl<T: Record> XmlElement for T {
    fn from_element(element: &Element, path: &ElementPath) -> XmlResult<Self> {
        T::read_fields(element, path)
    }

    fn to_element(&self, tag: &str) -> Option<Element> {
        let mut element = Element::new(tag);
        self.write_fields(&mut element);
        Some(element)
    }
}

/// Build a record's field table.
///
/// Each entry names a property kind from [`property`](crate::property), the
/// element tag (or attribute name) and the struct field it binds. Absent
/// entries keep the value from the record's `Default`. `sentinel` entries emit
/// an empty element and ignore it on read.
///
/// ```ignore
/// impl Record for Material {
///     const FIELDS: &'static [Field<Self>] = cwxml::schema!(Material {
///         Value "Type" => material_type,
///         FlagSet "Flags" => flags,
///         sentinel "Unknown",
///     });
/// }
/// ```
#[macro_export]
macro_rules! schema {
    ($record:ty { $($kind:ident $tag:literal $(=> $field:ident)?),* $(,)? }) => {
        &[$($crate::__schema_field!($record, $kind, $tag $(, $field)?)),*]
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __schema_field {
    ($record:ty, sentinel, $tag:literal) => {{
        fn read(
            _: &mut $record,
            _: &$crate::Element,
            _: &$crate::ElementPath,
        ) -> $crate::XmlResult<()> {
            Ok(())
        }
        fn write(_: &$record, element: &mut $crate::Element) {
            $crate::property::push_empty(element, $tag);
        }
        $crate::Field { tag: $tag, read, write }
    }};
    ($record:ty, $kind:ident, $tag:literal, $field:ident) => {{
        fn read(
            record: &mut $record,
            element: &$crate::Element,
            path: &$crate::ElementPath,
        ) -> $crate::XmlResult<()> {
            if let Some(value) =
                <$crate::property::$kind as $crate::property::Property<_>>::read(element, $tag, path)?
            {
                record.$field = value;
            }
            Ok(())
        }
        fn write(record: &$record, element: &mut $crate::Element) {
            <$crate::property::$kind as $crate::property::Property<_>>::write(
                element,
                $tag,
                &record.$field,
            );
        }
        $crate::Field { tag: $tag, read, write }
    }};
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use crate::{Flags, XmlError, parse_document, write_document};

    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Sample {
        name: String,
        count: u32,
        centre: Vec3,
        flags: Flags,
        points: Vec<Vec3>,
        children: Vec<Sample>,
    }

    impl Record for Sample {
        const FIELDS: &'static [Field<Self>] = crate::schema!(Sample {
            Attr "name" => name,
            Value "Count" => count,
            Vector "Centre" => centre,
            FlagSet "Flags" => flags,
            Rows "Points" => points,
            Items "Children" => children,
            sentinel "Marker",
        });
    }

    const DOC: &str = r#"<Sample name="a">
  <Count value="3" />
  <Centre x="1" y="2" z="3" />
  <Flags>A, B</Flags>
  <Points>
1, 2, 3
</Points>
  <Children>
    <Item name="b"><Count value="1" /></Item>
  </Children>
</Sample>"#;

    #[test]
    fn test_record_reads_fields() {
        let root = parse_document(DOC.as_bytes()).unwrap();
        let sample = Sample::from_element(&root, &ElementPath::root("Sample")).unwrap();
        assert_eq!(sample.name, "a");
        assert_eq!(sample.count, 3);
        assert_eq!(sample.centre, Vec3::new(1.0, 2.0, 3.0));
        assert!(sample.flags.contains("B"));
        assert_eq!(sample.points, vec![Vec3::new(1.0, 2.0, 3.0)]);
        assert_eq!(sample.children.len(), 1);
        assert_eq!(sample.children[0].name, "b");
        assert_eq!(sample.children[0].count, 1);
    }

    #[test]
    fn test_record_write_order_and_round_trip() {
        let root = parse_document(DOC.as_bytes()).unwrap();
        let sample = Sample::from_element(&root, &ElementPath::root("Sample")).unwrap();
        let element = sample.to_element("Sample").unwrap();
        let tags: Vec<&str> = element
            .children
            .iter()
            .filter_map(|c| c.as_element().map(|e| e.name.as_str()))
            .collect();
        assert_eq!(
            tags,
            ["Count", "Centre", "Flags", "Points", "Children", "Marker"]
        );

        let bytes = write_document(&element).unwrap();
        let again = parse_document(&bytes).unwrap();
        let reparsed = Sample::from_element(&again, &ElementPath::root("Sample")).unwrap();
        assert_eq!(reparsed, sample);
    }

    #[test]
    fn test_missing_values_default() {
        let root = parse_document(b"<Sample />").unwrap();
        let sample = Sample::from_element(&root, &ElementPath::root("Sample")).unwrap();
        assert_eq!(sample, Sample::default());
    }

    #[test]
    fn test_bad_value_is_schema_violation() {
        let root = parse_document(br#"<Sample><Count value="x" /></Sample>"#).unwrap();
        let result = Sample::from_element(&root, &ElementPath::root("Sample"));
        match result {
            Err(XmlError::SchemaViolation { element, .. }) => {
                assert_eq!(element.as_str(), "Sample/Count@value");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
