//! XML reader and structural validator
//!
//! Parses raw text into a `roxmltree` document and walks it against the fixed
//! structural schema of the indiware dialect. Any deviation rejects the whole
//! file; there is no partial recovery.

use roxmltree::{Document, Node};

use super::schema::{
    ClassElement, CourseElement, Head, LessonElement, MarkedField, PeriodElement, PlanDocument,
    SubjectElement, SupervisionElement,
};
use crate::utils::error::ParseError;

type Result<T> = std::result::Result<T, ParseError>;

/// Read raw XML and validate it against the plan file schema
///
/// # Errors
///
/// Returns `ParseError::Xml` for malformed documents and
/// `ParseError::SchemaValidation` for documents with an unexpected shape.
pub fn read_and_validate(input: &str) -> Result<PlanDocument> {
    let document = Document::parse(input)?;
    let root = document.root_element();

    if root.tag_name().name() != "VpMobil" {
        return Err(ParseError::schema(
            "/",
            format!("expected root element VpMobil, found {}", root.tag_name().name()),
        ));
    }

    read_root(root)
}

fn read_root(root: Node<'_, '_>) -> Result<PlanDocument> {
    let path = "VpMobil";
    expect_children(
        root,
        path,
        &["Kopf", "FreieTage", "Klassen", "ZusatzInfo"],
    )?;

    let head = read_head(one(root, "Kopf", path)?)?;

    let free_days_node = one(root, "FreieTage", path)?;
    expect_children(free_days_node, "VpMobil/FreieTage", &["ft"])?;
    let free_days = elements(free_days_node, "ft")
        .map(|node| required_text(node, "VpMobil/FreieTage/ft"))
        .collect::<Result<Vec<_>>>()?;

    let classes_node = one(root, "Klassen", path)?;
    expect_children(classes_node, "VpMobil/Klassen", &["Kl"])?;
    let classes = elements(classes_node, "Kl")
        .enumerate()
        .map(|(index, node)| read_class(node, &format!("VpMobil/Klassen/Kl[{index}]")))
        .collect::<Result<Vec<_>>>()?;

    let messages = match optional(root, "ZusatzInfo", path)? {
        Some(node) => {
            expect_children(node, "VpMobil/ZusatzInfo", &["ZiZeile"])?;
            elements(node, "ZiZeile").map(optional_text).collect()
        }
        None => Vec::new(),
    };

    Ok(PlanDocument {
        head,
        free_days,
        classes,
        messages,
    })
}

fn read_head(node: Node<'_, '_>) -> Result<Head> {
    let path = "VpMobil/Kopf";

    // header metadata varies between exporter versions, unknown fields are tolerated
    let plan_kind = required_text(one(node, "planart", path)?, "VpMobil/Kopf/planart")?;
    let timestamp = required_text(one(node, "zeitstempel", path)?, "VpMobil/Kopf/zeitstempel")?;
    let plan_date = required_text(one(node, "DatumPlan", path)?, "VpMobil/Kopf/DatumPlan")?;
    let file_name = optional(node, "datei", path)?.and_then(optional_text);

    Ok(Head {
        plan_kind,
        timestamp,
        plan_date,
        file_name,
    })
}

fn read_class(node: Node<'_, '_>, path: &str) -> Result<ClassElement> {
    expect_children(
        node,
        path,
        &[
            "Kurz",
            "Hash",
            "KlStunden",
            "Kurse",
            "Unterricht",
            "Pl",
            "Klausuren",
            "Aufsichten",
        ],
    )?;

    let short_name = required_text(one(node, "Kurz", path)?, &format!("{path}/Kurz"))?;

    let periods = match optional(node, "KlStunden", path)? {
        Some(list) => {
            let list_path = format!("{path}/KlStunden");
            expect_children(list, &list_path, &["KlSt"])?;
            elements(list, "KlSt")
                .map(|item| {
                    let item_path = format!("{list_path}/KlSt");
                    Ok(PeriodElement {
                        number: required_text(item, &item_path)?,
                        from: required_attr(item, "ZeitVon", &item_path)?,
                        to: required_attr(item, "ZeitBis", &item_path)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        }
        None => Vec::new(),
    };

    let courses = match optional(node, "Kurse", path)? {
        Some(list) => {
            let list_path = format!("{path}/Kurse");
            expect_children(list, &list_path, &["Ku"])?;
            elements(list, "Ku")
                .map(|item| {
                    let item_path = format!("{list_path}/Ku");
                    expect_children(item, &item_path, &["KKz"])?;
                    let kkz = one(item, "KKz", &item_path)?;
                    let kkz_path = format!("{item_path}/KKz");
                    Ok(CourseElement {
                        name: required_text(kkz, &kkz_path)?,
                        teacher: kkz.attribute("KLe").unwrap_or_default().to_string(),
                    })
                })
                .collect::<Result<Vec<_>>>()?
        }
        None => Vec::new(),
    };

    let subjects = match optional(node, "Unterricht", path)? {
        Some(list) => {
            let list_path = format!("{path}/Unterricht");
            expect_children(list, &list_path, &["Ue"])?;
            elements(list, "Ue")
                .map(|item| {
                    let item_path = format!("{list_path}/Ue");
                    expect_children(item, &item_path, &["UeNr"])?;
                    let number = one(item, "UeNr", &item_path)?;
                    let number_path = format!("{item_path}/UeNr");
                    expect_attributes(number, &number_path, &["UeLe", "UeFa", "UeGr"])?;
                    Ok(SubjectElement {
                        number: required_text(number, &number_path)?,
                        subject: required_attr(number, "UeFa", &number_path)?,
                        teacher: required_attr(number, "UeLe", &number_path)?,
                        group: number.attribute("UeGr").map(str::to_string),
                    })
                })
                .collect::<Result<Vec<_>>>()?
        }
        None => Vec::new(),
    };

    let plan = one(node, "Pl", path)?;
    let plan_path = format!("{path}/Pl");
    expect_children(plan, &plan_path, &["Std"])?;
    let lessons = elements(plan, "Std")
        .enumerate()
        .map(|(index, item)| read_lesson(item, &format!("{plan_path}/Std[{index}]")))
        .collect::<Result<Vec<_>>>()?;

    let supervisions = match optional(node, "Aufsichten", path)? {
        Some(list) => {
            let list_path = format!("{path}/Aufsichten");
            expect_children(list, &list_path, &["Aufsicht"])?;
            elements(list, "Aufsicht")
                .enumerate()
                .map(|(index, item)| {
                    read_supervision(item, &format!("{list_path}/Aufsicht[{index}]"))
                })
                .collect::<Result<Vec<_>>>()?
        }
        None => Vec::new(),
    };

    Ok(ClassElement {
        short_name,
        periods,
        courses,
        subjects,
        lessons,
        supervisions,
    })
}

fn read_lesson(node: Node<'_, '_>, path: &str) -> Result<LessonElement> {
    expect_children(
        node,
        path,
        &["St", "Fa", "Le", "Ra", "Nr", "If", "Beginn", "Ende", "Ku2"],
    )?;

    Ok(LessonElement {
        period: required_text(one(node, "St", path)?, &format!("{path}/St"))?,
        subject: marked_field(one(node, "Fa", path)?, ("FaAe", "FaGeaendert"), &format!("{path}/Fa"))?,
        teacher: marked_field(one(node, "Le", path)?, ("LeAe", "LeGeaendert"), &format!("{path}/Le"))?,
        room: marked_field(one(node, "Ra", path)?, ("RaAe", "RaGeaendert"), &format!("{path}/Ra"))?,
        number: optional(node, "Nr", path)?
            .map(|nr| required_text(nr, &format!("{path}/Nr")))
            .transpose()?,
        info: optional_text(one(node, "If", path)?),
        start: optional(node, "Beginn", path)?.and_then(optional_text),
        end: optional(node, "Ende", path)?.and_then(optional_text),
        course: optional(node, "Ku2", path)?.and_then(optional_text),
    })
}

fn read_supervision(node: Node<'_, '_>, path: &str) -> Result<SupervisionElement> {
    expect_children(
        node,
        path,
        &[
            "AuVorStunde",
            "AuUhrzeit",
            "AuZeit",
            "AuOrt",
            "AuFuer",
            "AuInfo",
        ],
    )?;
    expect_attributes(node, path, &["AuAe"])?;

    let text_of = |name: &str| -> Result<String> {
        required_text(one(node, name, path)?, &format!("{path}/{name}"))
    };

    Ok(SupervisionElement {
        marker: node.attribute("AuAe").map(str::to_string),
        preceding_period: text_of("AuVorStunde")?,
        time1: text_of("AuUhrzeit")?,
        time2: text_of("AuZeit")?,
        location: text_of("AuOrt")?,
        replacement_for: optional(node, "AuFuer", path)?.and_then(optional_text),
        info: optional(node, "AuInfo", path)?.and_then(optional_text),
    })
}

/// Read a field whose only permitted attribute is its change marker
fn marked_field(
    node: Node<'_, '_>,
    (marker, value): (&str, &str),
    path: &str,
) -> Result<MarkedField> {
    expect_attributes(node, path, &[marker])?;

    let changed = match node.attribute(marker) {
        Some(found) if found == value => true,
        Some(found) => {
            return Err(ParseError::schema(
                path,
                format!("{marker} must be {value}, found {found}"),
            ))
        }
        None => false,
    };

    Ok(MarkedField {
        text: optional_text(node),
        changed,
    })
}

fn elements<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == name)
}

fn expect_children(node: Node<'_, '_>, path: &str, allowed: &[&str]) -> Result<()> {
    for child in node.children().filter(Node::is_element) {
        let name = child.tag_name().name();
        if !allowed.contains(&name) {
            return Err(ParseError::schema(
                path,
                format!("unexpected element {name}"),
            ));
        }
    }
    Ok(())
}

fn expect_attributes(node: Node<'_, '_>, path: &str, allowed: &[&str]) -> Result<()> {
    for attribute in node.attributes() {
        if !allowed.contains(&attribute.name()) {
            return Err(ParseError::schema(
                path,
                format!("unexpected attribute {}", attribute.name()),
            ));
        }
    }
    Ok(())
}

fn one<'a, 'input>(node: Node<'a, 'input>, name: &str, path: &str) -> Result<Node<'a, 'input>> {
    optional(node, name, path)?
        .ok_or_else(|| ParseError::schema(path, format!("missing element {name}")))
}

fn optional<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
    path: &str,
) -> Result<Option<Node<'a, 'input>>> {
    let mut matches = node
        .children()
        .filter(|child| child.is_element() && child.tag_name().name() == name);

    let first = matches.next();
    if matches.next().is_some() {
        return Err(ParseError::schema(
            path,
            format!("element {name} must appear at most once"),
        ));
    }

    Ok(first)
}

fn required_text(node: Node<'_, '_>, path: &str) -> Result<String> {
    optional_text(node).ok_or_else(|| ParseError::schema(path, "missing text content"))
}

fn optional_text(node: Node<'_, '_>) -> Option<String> {
    node.text().filter(|text| !text.is_empty()).map(str::to_string)
}

fn required_attr(node: Node<'_, '_>, name: &str, path: &str) -> Result<String> {
    node.attribute(name)
        .map(str::to_string)
        .ok_or_else(|| ParseError::schema(path, format!("missing attribute {name}")))
}
