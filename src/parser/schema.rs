//! Typed view of a validated indiware plan document
//!
//! The reader only hands out values of these types once the raw XML tree has
//! matched the structural schema, so the postprocessor never has to deal with
//! missing required elements.
//!
//! The accepted shape:
//!
//! ```xml
//! <VpMobil>
//!   <Kopf>
//!     <planart>K</planart>
//!     <zeitstempel>04.09.2019, 09:40</zeitstempel>
//!     <DatumPlan>Donnerstag, 05. September 2019</DatumPlan>
//!     <datei>PlanKl20190905.xml</datei>
//!   </Kopf>
//!   <FreieTage><ft>190801</ft></FreieTage>
//!   <Klassen>
//!     <Kl>
//!       <Kurz>5a</Kurz>
//!       <KlStunden><KlSt ZeitVon="07:45" ZeitBis="08:30">1</KlSt></KlStunden>
//!       <Kurse><Ku><KKz KLe="Mei">ma1</KKz></Ku></Kurse>
//!       <Unterricht><Ue><UeNr UeLe="Mei" UeFa="MA">12</UeNr></Ue></Unterricht>
//!       <Pl>
//!         <Std>
//!           <St>1</St>
//!           <Fa FaAe="FaGeaendert">DE</Fa>
//!           <Le>Mül</Le>
//!           <Ra>101</Ra>
//!           <If/>
//!         </Std>
//!       </Pl>
//!       <Aufsichten>
//!         <Aufsicht AuAe="AuVertretung">
//!           <AuVorStunde>2</AuVorStunde>
//!           <AuUhrzeit>09:20</AuUhrzeit>
//!           <AuZeit>09:20 - 09:40</AuZeit>
//!           <AuOrt>Hof</AuOrt>
//!         </Aufsicht>
//!       </Aufsichten>
//!     </Kl>
//!   </Klassen>
//!   <ZusatzInfo><ZiZeile>Text</ZiZeile></ZusatzInfo>
//! </VpMobil>
//! ```

/// Root of a validated plan file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDocument {
    pub head: Head,
    /// Raw `YYMMDD` tokens
    pub free_days: Vec<String>,
    pub classes: Vec<ClassElement>,
    /// `ZiZeile` lines, `None` for empty lines
    pub messages: Vec<Option<String>>,
}

/// `Kopf` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    pub plan_kind: String,
    pub timestamp: String,
    pub plan_date: String,
    pub file_name: Option<String>,
}

/// `Kl` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassElement {
    pub short_name: String,
    pub periods: Vec<PeriodElement>,
    pub courses: Vec<CourseElement>,
    pub subjects: Vec<SubjectElement>,
    pub lessons: Vec<LessonElement>,
    pub supervisions: Vec<SupervisionElement>,
}

/// `KlSt` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodElement {
    pub number: String,
    pub from: String,
    pub to: String,
}

/// `Ku/KKz` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseElement {
    pub name: String,
    pub teacher: String,
}

/// `Ue/UeNr` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectElement {
    pub number: String,
    pub subject: String,
    pub teacher: String,
    pub group: Option<String>,
}

/// A text element that may carry a change marker attribute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkedField {
    pub text: Option<String>,
    pub changed: bool,
}

/// `Std` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonElement {
    pub period: String,
    pub subject: MarkedField,
    pub teacher: MarkedField,
    pub room: MarkedField,
    pub number: Option<String>,
    pub info: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub course: Option<String>,
}

/// `Aufsicht` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisionElement {
    /// Value of the `AuAe` attribute, if present
    pub marker: Option<String>,
    pub preceding_period: String,
    pub time1: String,
    pub time2: String,
    pub location: String,
    pub replacement_for: Option<String>,
    pub info: Option<String>,
}
