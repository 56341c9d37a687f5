//! Special-use mailbox detection (RFC 6154).
//!
//! Server-advertised flags win. Otherwise the lowercased mailbox name is
//! looked up in a table of localized folder names.

/// Special-use flags in detection order.
pub const SPECIAL_USE_FLAGS: &[&str] = &[
    "\\All",
    "\\Archive",
    "\\Drafts",
    "\\Flagged",
    "\\Junk",
    "\\Sent",
    "\\Trash",
];

/// Returns the special-use flag among `flags`, if any.
#[must_use]
pub fn from_flags<S: AsRef<str>>(flags: &[S]) -> Option<&'static str> {
    SPECIAL_USE_FLAGS
        .iter()
        .copied()
        .find(|special| flags.iter().any(|flag| flag.as_ref() == *special))
}

/// Guesses the special-use flag from a localized mailbox name.
#[must_use]
pub fn from_name(name: &str) -> Option<&'static str> {
    let name = name.trim().to_lowercase();
    BY_NAME
        .iter()
        .find(|(_, names)| names.contains(&name.as_str()))
        .map(|(flag, _)| *flag)
}

const BY_NAME: &[(&str, &[&str])] = &[
    ("\\Sent", SENT),
    ("\\Trash", TRASH),
    ("\\Junk", JUNK),
    ("\\Drafts", DRAFTS),
];

const SENT: &[&str] = &[
    "aika",
    "bidaliak",
    "bidalita",
    "dihantar",
    "e rometsweng",
    "e tindami",
    "elküldött",
    "elküldöttek",
    "enviadas",
    "enviados",
    "enviats",
    "envoyés",
    "ethunyelweyo",
    "expediate",
    "ezipuru",
    "gesendete",
    "gestuur",
    "gönderilmiş öğeler",
    "göndərilənlər",
    "iberilen",
    "inviati",
    "išsiųstieji",
    "kuthunyelwe",
    "lasa",
    "lähetetyt",
    "messages envoyés",
    "naipadala",
    "nalefa",
    "napadala",
    "nosūtītās ziņas",
    "odeslané",
    "padala",
    "poslane",
    "poslano",
    "poslané",
    "poslato",
    "saadetud",
    "saadetud kirjad",
    "sendt",
    "sent",
    "sent items",
    "sent messages",
    "sända poster",
    "sänt",
    "terkirim",
    "ti fi ranṣẹ",
    "të dërguara",
    "verzonden",
    "vilivyotumwa",
    "wysłane",
    "đã gửi",
    "σταλθέντα",
    "жиберилген",
    "жіберілгендер",
    "изпратени",
    "илгээсэн",
    "ирсол шуд",
    "испратено",
    "надіслані",
    "отправленные",
    "пасланыя",
    "юборилган",
    "ուղարկված",
    "נשלחו",
    "פריטים שנשלחו",
    "المرسلة",
    "بھیجے گئے",
    "سوزمژہ",
    "لېګل شوی",
    "موارد ارسال شده",
    "पाठविले",
    "पाठविलेले",
    "प्रेषित",
    "भेजा गया",
    "প্রেরিত",
    "প্ৰেৰিত",
    "ਭੇਜੇ",
    "મોકલેલા",
    "ପଠାଗଲା",
    "அனுப்பியவை",
    "పంపించబడింది",
    "ಕಳುಹಿಸಲಾದ",
    "അയച്ചു",
    "යැවු පණිවුඩ",
    "ส่งแล้ว",
    "გაგზავნილი",
    "የተላኩ",
    "បាន\u{200b}ផ្ញើ",
    "寄件備份",
    "已发信息",
    "送信済みﾒｰﾙ",
    "발신 메시지",
    "보낸 편지함",
];

const TRASH: &[&str] = &[
    "articole șterse",
    "bin",
    "borttagna objekt",
    "deleted",
    "deleted items",
    "deleted messages",
    "elementi eliminati",
    "elementos borrados",
    "elementos eliminados",
    "gelöschte objekte",
    "item dipadam",
    "itens apagados",
    "itens excluídos",
    "mục đã xóa",
    "odstraněné položky",
    "pesan terhapus",
    "poistetut",
    "praht",
    "prügikast",
    "silinmiş öğeler",
    "slettede beskeder",
    "slettede elementer",
    "trash",
    "törölt elemek",
    "usunięte wiadomości",
    "verwijderde items",
    "vymazané správy",
    "éléments supprimés",
    "видалені",
    "жойылғандар",
    "удаленные",
    "פריטים שנמחקו",
    "العناصر المحذوفة",
    "موارد حذف شده",
    "รายการที่ลบ",
    "已删除邮件",
    "已刪除項目",
];

const JUNK: &[&str] = &[
    "bulk mail",
    "correo no deseado",
    "courrier indésirable",
    "istenmeyen",
    "istenmeyen e-posta",
    "junk",
    "levélszemét",
    "nevyžiadaná pošta",
    "nevyžádaná pošta",
    "no deseado",
    "posta indesiderata",
    "pourriel",
    "roskaposti",
    "skräppost",
    "spam",
    "spamowanie",
    "søppelpost",
    "thư rác",
    "спам",
    "דואר זבל",
    "الرسائل العشوائية",
    "هرزنامه",
    "สแปม",
    "\u{200e}垃圾郵件",
    "垃圾邮件",
    "垃圾電郵",
];

const DRAFTS: &[&str] = &[
    "ba brouillon",
    "borrador",
    "borradores",
    "bozze",
    "brouillons",
    "bản thảo",
    "ciorne",
    "concepten",
    "draf",
    "drafts",
    "drög",
    "entwürfe",
    "esborranys",
    "garalamalar",
    "ihe edeturu",
    "iidrafti",
    "izinhlaka",
    "juodraščiai",
    "kladd",
    "kladder",
    "koncepty",
    "konsep",
    "konsepte",
    "kopie robocze",
    "layihələr",
    "luonnokset",
    "melnraksti",
    "meralo",
    "mesazhe të padërguara",
    "mga draft",
    "mustandid",
    "nacrti",
    "osnutki",
    "piszkozatok",
    "rascunhos",
    "rasimu",
    "skice",
    "taslaklar",
    "tsararrun saƙonni",
    "utkast",
    "vakiraoka",
    "vázlatok",
    "zirriborroak",
    "àwọn àkọpamọ́",
    "πρόχειρα",
    "жобалар",
    "нацрти",
    "нооргууд",
    "сиёҳнавис",
    "хомаки хатлар",
    "чарнавікі",
    "чернетки",
    "чернови",
    "черновики",
    "черновиктер",
    "սևագրեր",
    "טיוטות",
    "مسودات",
    "موسودې",
    "پیش نویسها",
    "ڈرافٹ/",
    "ड्राफ़्ट",
    "प्रारूप",
    "খসড়া",
    "ড্ৰাফ্ট",
    "ਡ੍ਰਾਫਟ",
    "ડ્રાફ્ટસ",
    "ଡ୍ରାଫ୍ଟ",
    "வரைவுகள்",
    "చిత్తు ప్రతులు",
    "ಕರಡುಗಳು",
    "കരടുകള്\u{200d}",
    "කෙටුම් පත්",
    "ฉบับร่าง",
    "მონახაზები",
    "ረቂቆች",
    "សារព្រាង",
    "下書き",
    "草稿",
    "임시 보관함",
];
