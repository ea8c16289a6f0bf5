//! Logical screen markers and the template images that recognise them.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    SelectFiles,
    Playlist,
    Subscribe,
    Next,
    OpenDialog,
    Step2,
    Step2Add,
    ChooseEndScreen,
    Done,
    Save,
    EndScreen,
    ChooseSpecificVideo,
    CardAlt,
    Schedule,
    SchedulePublish,
    Understood,
    FileName,
    UploadFile,
    EndScreenSaved,
    Card,
    TagVideo,
    TimeField,
    Continue,
    Visibility,
    ExperimentalUi,
}

impl Marker {
    pub const ALL: [Marker; 25] = [
        Marker::SelectFiles,
        Marker::Playlist,
        Marker::Subscribe,
        Marker::Next,
        Marker::OpenDialog,
        Marker::Step2,
        Marker::Step2Add,
        Marker::ChooseEndScreen,
        Marker::Done,
        Marker::Save,
        Marker::EndScreen,
        Marker::ChooseSpecificVideo,
        Marker::CardAlt,
        Marker::Schedule,
        Marker::SchedulePublish,
        Marker::Understood,
        Marker::FileName,
        Marker::UploadFile,
        Marker::EndScreenSaved,
        Marker::Card,
        Marker::TagVideo,
        Marker::TimeField,
        Marker::Continue,
        Marker::Visibility,
        Marker::ExperimentalUi,
    ];

    /// Image file name inside the template directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Marker::SelectFiles => "chonfile.png",
            Marker::Playlist => "danhsachphat.png",
            Marker::Subscribe => "dangky.png",
            Marker::Next => "tiep.png",
            Marker::OpenDialog => "open.png",
            Marker::Step2 => "buoc2.png",
            Marker::ChooseEndScreen => "chonmanhinhketthuc.png",
            Marker::Step2Add => "them.png",
            Marker::Done => "xong.png",
            Marker::Save => "luu.png",
            Marker::EndScreen => "manhinhketthuc.png",
            Marker::ChooseSpecificVideo => "chonmotvideocuthe.png",
            Marker::CardAlt => "the1.png",
            Marker::Schedule => "henlich.png",
            Marker::SchedulePublish => "lenlich.png",
            Marker::Understood => "dahieu.png",
            Marker::FileName => "filename.png",
            Marker::UploadFile => "taiteplen.png",
            Marker::EndScreenSaved => "ketthucok.png",
            Marker::Card => "the.png",
            Marker::TagVideo => "tagvideo.png",
            Marker::TimeField => "time.png",
            Marker::Continue => "tieptuc.png",
            Marker::Visibility => "chedohienthi.png",
            Marker::ExperimentalUi => "thunghiem.png",
        }
    }
}

impl std::fmt::Display for Marker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}

/// A marker resolved to an image on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Template {
    pub marker: Marker,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TemplateSet {
    dir: PathBuf,
}

impl TemplateSet {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn resolve(&self, marker: Marker) -> Template {
        Template {
            marker,
            path: self.dir.join(marker.file_name()),
        }
    }

    /// Markers whose image file is absent.
    pub fn missing(&self) -> Vec<Marker> {
        Marker::ALL
            .iter()
            .copied()
            .filter(|m| !self.resolve(*m).path.is_file())
            .collect()
    }
}
