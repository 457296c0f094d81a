//! AppleScript sources for the Apple Mail bridge.
//!
//! The fetch script emits the transport format from `mail::codec`, applying
//! the same escaping and body truncation rules on the Mail side.

/// Returned by the label script on success.
pub const LABEL_OK_PREFIX: &str = "Success";
/// Returned by the label script when the id is in neither mailbox.
pub const LABEL_NOT_FOUND_PREFIX: &str = "Error - Message Not Found";
/// Returned by the label script when setting the flag index failed.
pub const LABEL_FLAG_FAILED_PREFIX: &str = "Error - Flag Set Failed:";

/// Shared handlers: escaping plus single-message encoding.
const HANDLERS: &str = r#"
on replaceText(sourceText, searchString, replacementString)
    set AppleScript's text item delimiters to searchString
    set textItems to every text item of sourceText
    set AppleScript's text item delimiters to replacementString
    set newText to textItems as string
    set AppleScript's text item delimiters to ""
    return newText
end replaceText

on escapeField(fieldText)
    set escaped to my replaceText(fieldText as string, "[", "[LB]")
    set escaped to my replaceText(escaped, "<<<", "[LT]")
    set escaped to my replaceText(escaped, ">>>", "[GT]")
    return escaped
end escapeField

on encodeMessage(theMessage, bodyLimit)
    tell application "Mail"
        set msgID to id of theMessage
        set msgSubject to subject of theMessage
        set msgSender to sender of theMessage
        set msgDate to (date received of theMessage) as string
        set msgBody to content of theMessage
    end tell
    if (count of characters of msgBody) > bodyLimit then
        set msgBody to (characters 1 through bodyLimit of msgBody as string) & "..."
    end if
    return "<<<START>>>" & msgID & "<<<TAB>>>" & my escapeField(msgSubject) & "<<<TAB>>>" & my escapeField(msgSender) & "<<<TAB>>>" & my escapeField(msgDate) & "<<<TAB>>>" & my escapeField(msgBody) & "<<<END>>>"
end encodeMessage
"#;

/// Script returning every inbox message received in the last
/// `window_secs`, or the newest `fallback_count` messages when the date
/// filter errors out.
pub fn fetch_script(window_secs: u64, fallback_count: usize, body_limit: usize) -> String {
    format!(
        r#"{HANDLERS}
tell application "Mail"
    check for new mail
    delay 1

    set cutoffDate to (current date) - {window_secs}
    log "Getting emails since: " & (cutoffDate as string)

    set completeResult to ""

    try
        set recentMessages to (messages of inbox whose date received comes after cutoffDate)
        log "Found " & (count of recentMessages) & " messages in window"
        repeat with theMessage in recentMessages
            try
                set completeResult to completeResult & my encodeMessage(theMessage, {body_limit})
            on error errMsg
                log "Error processing message: " & errMsg
            end try
        end repeat
    on error errMsg
        log "Date filtering error: " & errMsg
        log "Falling back to the most recent {fallback_count} messages"
        try
            set inboxCount to count of messages of inbox
            set lastIndex to {fallback_count}
            if inboxCount < lastIndex then set lastIndex to inboxCount
            if lastIndex > 0 then
                repeat with theMessage in (messages 1 through lastIndex of inbox)
                    try
                        set completeResult to completeResult & my encodeMessage(theMessage, {body_limit})
                    on error errMsg
                        log "Error with fallback: " & errMsg
                    end try
                end repeat
            end if
        on error finalErr
            log "Failed all attempts: " & finalErr
        end try
    end try

    return completeResult
end tell
"#
    )
}

/// Script that sets the flag index of message `id`, searching the inbox
/// first and the sent mailbox second.
pub fn label_script(id: i64, marker: u8) -> String {
    format!(
        r#"
tell application "Mail"
    set targetID to {id}
    set theColorIndex to {marker}
    set targetMessage to missing value

    try
        set matchingInbox to (messages of inbox whose id is targetID)
        if (count of matchingInbox) > 0 then set targetMessage to item 1 of matchingInbox
    on error errMsgInbox
        log "Error searching inbox by ID " & targetID & ": " & errMsgInbox
    end try

    if targetMessage is missing value then
        try
            set matchingSent to (messages of sent mailbox whose id is targetID)
            if (count of matchingSent) > 0 then set targetMessage to item 1 of matchingSent
        on error errMsgSent
            log "Error searching sent mailbox by ID " & targetID & ": " & errMsgSent
        end try
    end if

    if targetMessage is missing value then
        return "{LABEL_NOT_FOUND_PREFIX}"
    end if

    try
        set flag index of targetMessage to theColorIndex
        return "{LABEL_OK_PREFIX}: label applied"
    on error errMsgSetFlag
        return "{LABEL_FLAG_FAILED_PREFIX} " & errMsgSetFlag
    end try
end tell
"#
    )
}
